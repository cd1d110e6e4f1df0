// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime records for monitored agent runs

use crate::id::MonitoringId;
use crate::session::SessionId;
use crate::telemetry::Telemetry;
use crate::EngineId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle status of one agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Running,
    Paused,
    Completed,
    Failed,
}

impl AgentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentStatus::Completed | AgentStatus::Failed)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Running => write!(f, "running"),
            AgentStatus::Paused => write!(f, "paused"),
            AgentStatus::Completed => write!(f, "completed"),
            AgentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One agent run as tracked by the monitor.
///
/// Invariants, enforced by the monitor:
/// - root agents have no `parent`; a child's parent exists
/// - `Completed`/`Failed` imply `ended_at_ms` is set
/// - `Paused` requires a non-empty `session_id`
/// - telemetry survives failure, it is never zeroed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: MonitoringId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<MonitoringId>,
    pub engine: EngineId,
    pub model: String,
    /// The prompt exactly as sent to the engine.
    pub prompt: String,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub log_path: PathBuf,
    #[serde(default)]
    pub telemetry: Telemetry,
}

impl AgentRecord {
    /// True when the run can be resumed as a conversation.
    pub fn is_resumable(&self) -> bool {
        self.session_id.as_ref().is_some_and(|s| !s.is_empty())
    }
}

/// A node in the parent/child agent tree.
#[derive(Debug, Clone, Serialize)]
pub struct AgentTreeNode {
    pub record: AgentRecord,
    pub children: Vec<AgentTreeNode>,
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
