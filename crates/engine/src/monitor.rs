// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent monitor: registry of agent runs with lifecycle and hierarchy
//!
//! Arena of records keyed by monotonic integer ids; parent/child edges are
//! id references, never back-pointers. `register(parent) < register(child)`
//! is enforced by the id assignment itself.

use cm_core::{
    AgentRecord, AgentStatus, AgentTreeNode, Clock, EngineId, MonitoringId, SessionId, Telemetry,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// What the step runner supplies when registering a run.
#[derive(Debug, Clone)]
pub struct RegisterAgent {
    pub name: String,
    pub prompt: String,
    pub parent: Option<MonitoringId>,
    pub engine: EngineId,
    pub model: String,
}

/// Filter for [`AgentMonitor::query_agents`].
#[derive(Debug, Clone, Default)]
pub struct AgentQuery {
    pub status: Option<AgentStatus>,
    pub parent: Option<MonitoringId>,
    pub name: Option<String>,
}

#[derive(Default)]
struct MonitorInner {
    next_id: u64,
    agents: BTreeMap<MonitoringId, AgentRecord>,
}

/// Process-wide registry of agent runs.
pub struct AgentMonitor {
    clock: Arc<dyn Clock>,
    inner: Mutex<MonitorInner>,
}

impl AgentMonitor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(MonitorInner::default()),
        }
    }

    /// Create a record with status `running` and an auto-incremented id.
    /// The log path is attached once the logger has opened the file.
    pub fn register(&self, spec: RegisterAgent) -> MonitoringId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = MonitoringId(inner.next_id);
        let record = AgentRecord {
            id,
            name: spec.name,
            parent: spec.parent,
            engine: spec.engine,
            model: spec.model,
            prompt: spec.prompt,
            started_at_ms: self.clock.now_ms(),
            ended_at_ms: None,
            duration_ms: None,
            status: AgentStatus::Running,
            error: None,
            session_id: None,
            log_path: PathBuf::new(),
            telemetry: Telemetry::default(),
        };
        inner.agents.insert(id, record);
        id
    }

    /// Recreate a record under a persisted id after a restart, bumping the
    /// id counter past it so new registrations never collide.
    pub fn reattach(&self, id: MonitoringId, spec: RegisterAgent) {
        let mut inner = self.inner.lock();
        inner.next_id = inner.next_id.max(id.as_u64());
        let record = AgentRecord {
            id,
            name: spec.name,
            parent: spec.parent,
            engine: spec.engine,
            model: spec.model,
            prompt: spec.prompt,
            started_at_ms: self.clock.now_ms(),
            ended_at_ms: None,
            duration_ms: None,
            status: AgentStatus::Running,
            error: None,
            session_id: None,
            log_path: PathBuf::new(),
            telemetry: Telemetry::default(),
        };
        inner.agents.insert(id, record);
    }

    pub fn set_log_path(&self, id: MonitoringId, log_path: PathBuf) {
        let mut inner = self.inner.lock();
        if let Some(record) = inner.agents.get_mut(&id) {
            record.log_path = log_path;
        }
    }

    pub fn mark_running(&self, id: MonitoringId) {
        let mut inner = self.inner.lock();
        if let Some(record) = inner.agents.get_mut(&id) {
            record.status = AgentStatus::Running;
            record.ended_at_ms = None;
            record.duration_ms = None;
            record.error = None;
        }
    }

    /// Transition to `paused`. Returns false (leaving the record untouched)
    /// when the run has no session to resume — paused without a session
    /// would be unrecoverable.
    pub fn mark_paused(&self, id: MonitoringId) -> bool {
        let mut inner = self.inner.lock();
        let Some(record) = inner.agents.get_mut(&id) else {
            return false;
        };
        if !record.is_resumable() {
            return false;
        }
        record.status = AgentStatus::Paused;
        true
    }

    /// Terminal success. Telemetry is preserved when none is passed.
    pub fn complete(&self, id: MonitoringId, telemetry: Option<&Telemetry>) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        if let Some(record) = inner.agents.get_mut(&id) {
            record.status = AgentStatus::Completed;
            record.ended_at_ms = Some(now);
            record.duration_ms = Some(now.saturating_sub(record.started_at_ms));
            if let Some(telemetry) = telemetry {
                record.telemetry = telemetry.clone();
            }
        }
    }

    /// Terminal failure. Telemetry is never zeroed. Cooperative aborts log
    /// at debug level, not error.
    pub fn fail(&self, id: MonitoringId, error: &str, is_abort: bool) {
        if is_abort {
            tracing::debug!(%id, error, "agent aborted");
        } else {
            tracing::error!(%id, error, "agent failed");
        }
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        if let Some(record) = inner.agents.get_mut(&id) {
            record.status = AgentStatus::Failed;
            record.ended_at_ms = Some(now);
            record.duration_ms = Some(now.saturating_sub(record.started_at_ms));
            record.error = Some(error.to_string());
        }
    }

    pub fn update_telemetry(&self, id: MonitoringId, telemetry: &Telemetry) {
        let mut inner = self.inner.lock();
        if let Some(record) = inner.agents.get_mut(&id) {
            record.telemetry.apply(telemetry);
        }
    }

    pub fn set_session_id(&self, id: MonitoringId, session_id: &SessionId) {
        let mut inner = self.inner.lock();
        if let Some(record) = inner.agents.get_mut(&id) {
            record.session_id = Some(session_id.clone());
        }
    }

    // -- queries --------------------------------------------------------

    pub fn get_agent(&self, id: MonitoringId) -> Option<AgentRecord> {
        self.inner.lock().agents.get(&id).cloned()
    }

    pub fn get_all_agents(&self) -> Vec<AgentRecord> {
        self.inner.lock().agents.values().cloned().collect()
    }

    pub fn query_agents(&self, query: &AgentQuery) -> Vec<AgentRecord> {
        self.inner
            .lock()
            .agents
            .values()
            .filter(|record| {
                query.status.is_none_or(|status| record.status == status)
                    && query.parent.is_none_or(|parent| record.parent == Some(parent))
                    && query
                        .name
                        .as_deref()
                        .is_none_or(|name| record.name == name)
            })
            .cloned()
            .collect()
    }

    pub fn get_children(&self, parent: MonitoringId) -> Vec<AgentRecord> {
        self.inner
            .lock()
            .agents
            .values()
            .filter(|record| record.parent == Some(parent))
            .cloned()
            .collect()
    }

    pub fn get_root_agents(&self) -> Vec<AgentRecord> {
        self.inner
            .lock()
            .agents
            .values()
            .filter(|record| record.parent.is_none())
            .cloned()
            .collect()
    }

    /// The node and every transitive descendant, iteratively.
    pub fn get_full_subtree(&self, id: MonitoringId) -> Vec<AgentRecord> {
        let inner = self.inner.lock();
        let mut result = Vec::new();
        let mut frontier = vec![id];
        while let Some(current) = frontier.pop() {
            if let Some(record) = inner.agents.get(&current) {
                result.push(record.clone());
            }
            for (child_id, record) in inner.agents.iter() {
                if record.parent == Some(current) {
                    frontier.push(*child_id);
                }
            }
        }
        result
    }

    pub fn build_agent_tree(&self) -> Vec<AgentTreeNode> {
        let inner = self.inner.lock();
        let roots: Vec<MonitoringId> = inner
            .agents
            .values()
            .filter(|record| record.parent.is_none())
            .map(|record| record.id)
            .collect();
        roots
            .into_iter()
            .filter_map(|id| build_node(&inner.agents, id))
            .collect()
    }

    /// Remove the whole subtree below `id` (children before parents). Used
    /// when a loop rewinds past an agent so its children are re-created
    /// fresh. The agent itself stays.
    pub fn clear_descendants(&self, id: MonitoringId) -> usize {
        let mut inner = self.inner.lock();
        let mut to_remove = Vec::new();
        let mut frontier = vec![id];
        while let Some(current) = frontier.pop() {
            for (child_id, record) in inner.agents.iter() {
                if record.parent == Some(current) {
                    frontier.push(*child_id);
                }
            }
            if current != id {
                to_remove.push(current);
            }
        }
        // Post-order: deepest ids were discovered last.
        for target in to_remove.iter().rev() {
            inner.agents.remove(target);
        }
        to_remove.len()
    }

    /// Remove every record; returns how many were cleared.
    pub fn clear_all(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.agents.len();
        inner.agents.clear();
        count
    }
}

fn build_node(
    agents: &BTreeMap<MonitoringId, AgentRecord>,
    id: MonitoringId,
) -> Option<AgentTreeNode> {
    let record = agents.get(&id)?.clone();
    let children = agents
        .values()
        .filter(|candidate| candidate.parent == Some(id))
        .filter_map(|child| build_node(agents, child.id))
        .collect();
    Some(AgentTreeNode { record, children })
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
