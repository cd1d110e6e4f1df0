// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step-index manager — the single authority over `template.json`
//!
//! Reads are idempotent; writes are serialized per-process behind one lock
//! and flushed through on every mutation, so a read always sees the value
//! written by the immediately preceding write in the same process.

use crate::tracking::{ControllerConfig, StepData, TemplateTracking, TrackingError};
use cm_core::{AutonomousMode, MonitoringId, SessionId};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Lifecycle phase of one step, derived from tracking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    NotStarted,
    Started,
    SessionInitialized,
    ChainInProgress,
    Completed,
}

/// How the next run should begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    StartFresh,
    ResumeFromChain,
    ResumeFromCrash,
    ContinueAfterCompleted,
}

/// Where to resume, and with what session.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeInfo {
    pub start_index: usize,
    pub decision: ResumeDecision,
    pub chain_index: Option<usize>,
    pub session_id: Option<SessionId>,
    pub monitoring_id: Option<MonitoringId>,
}

/// Single source of truth for which step is next and which chains within a
/// step completed. Only this type writes `template.json`.
pub struct StepIndexManager {
    path: PathBuf,
    state: Mutex<TemplateTracking>,
}

impl StepIndexManager {
    /// Load existing tracking (migrating legacy shapes) or start fresh.
    pub fn load(path: impl Into<PathBuf>, active_template: &str) -> Result<Self, TrackingError> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<TemplateTracking>(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                TemplateTracking::new(active_template)
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// In-memory manager for tests; still writes through to `path`.
    pub fn with_state(path: impl Into<PathBuf>, state: TemplateTracking) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut TemplateTracking) -> T) -> Result<T, TrackingError> {
        let mut state = self.state.lock();
        let result = f(&mut state);
        state.last_updated = chrono::Utc::now().to_rfc3339();
        let json = serde_json::to_string_pretty(&*state)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        Ok(result)
    }

    fn read<T>(&self, f: impl FnOnce(&TemplateTracking) -> T) -> T {
        f(&self.state.lock())
    }

    // -- step lifecycle -------------------------------------------------

    /// Record that a step began executing.
    pub fn step_started(&self, step_index: usize) -> Result<(), TrackingError> {
        self.mutate(|state| {
            if !state.not_completed_steps.contains(&step_index) {
                state.not_completed_steps.push(step_index);
                state.not_completed_steps.sort_unstable();
            }
        })
    }

    /// Create or update the step's session, preserving completed chains.
    pub fn step_session_initialized(
        &self,
        step_index: usize,
        session_id: &SessionId,
        monitoring_id: MonitoringId,
    ) -> Result<(), TrackingError> {
        self.mutate(|state| {
            let entry = state.completed_steps.entry(step_index).or_default();
            entry.session_id = session_id.to_string();
            entry.monitoring_id = monitoring_id.as_u64();
        })
    }

    /// Refresh the session after a resume round.
    pub fn update_step_session(
        &self,
        step_index: usize,
        session_id: &SessionId,
        monitoring_id: MonitoringId,
    ) -> Result<(), TrackingError> {
        self.step_session_initialized(step_index, session_id, monitoring_id)
    }

    /// Record one chained prompt as done. Idempotent per `(step, chain)`.
    pub fn chain_completed(&self, step_index: usize, chain_index: usize) -> Result<(), TrackingError> {
        self.mutate(|state| {
            let entry = state.completed_steps.entry(step_index).or_default();
            let chains = entry.completed_chains.get_or_insert_with(Vec::new);
            if !chains.contains(&chain_index) {
                chains.push(chain_index);
                chains.sort_unstable();
            }
        })
    }

    /// Mark a step fully done.
    pub fn step_completed(&self, step_index: usize) -> Result<(), TrackingError> {
        self.mutate(|state| {
            let entry = state.completed_steps.entry(step_index).or_default();
            entry.completed_at = Some(chrono::Utc::now().to_rfc3339());
            entry.completed_chains = None;
            state.not_completed_steps.retain(|&i| i != step_index);
        })
    }

    /// Clear crash-recovery state after a fallback handled the step.
    pub fn remove_from_not_completed(&self, step_index: usize) -> Result<(), TrackingError> {
        self.mutate(|state| {
            state.not_completed_steps.retain(|&i| i != step_index);
        })
    }

    // -- queries --------------------------------------------------------

    pub fn is_step_completed(&self, step_index: usize) -> bool {
        self.read(|state| {
            state
                .completed_steps
                .get(&step_index)
                .is_some_and(|data| data.completed_at.is_some())
        })
    }

    pub fn get_step_data(&self, step_index: usize) -> Option<StepData> {
        self.read(|state| state.completed_steps.get(&step_index).cloned())
    }

    /// Fully-completed step indices, sorted ascending.
    pub fn get_completed_steps(&self) -> Vec<usize> {
        self.read(|state| {
            state
                .completed_steps
                .iter()
                .filter(|(_, data)| data.completed_at.is_some())
                .map(|(&index, _)| index)
                .collect()
        })
    }

    pub fn get_not_completed_steps(&self) -> Vec<usize> {
        self.read(|state| state.not_completed_steps.clone())
    }

    pub fn get_step_phase(&self, step_index: usize) -> StepPhase {
        self.read(|state| {
            let data = state.completed_steps.get(&step_index);
            if data.is_some_and(|d| d.completed_at.is_some()) {
                return StepPhase::Completed;
            }
            if data.is_some_and(|d| d.completed_chains.as_ref().is_some_and(|c| !c.is_empty())) {
                return StepPhase::ChainInProgress;
            }
            if data.is_some_and(|d| !d.session_id.is_empty()) {
                return StepPhase::SessionInitialized;
            }
            if state.not_completed_steps.contains(&step_index) {
                return StepPhase::Started;
            }
            StepPhase::NotStarted
        })
    }

    /// Decide where the next run starts. Priority:
    /// 1. `resume_from_last_step == false` → start fresh
    /// 2. a step with completed chains but no `completed_at` → resume mid-chain
    /// 3. crashed steps → resume at the highest (steps are sequential)
    /// 4. any completed step → continue after the highest
    /// 5. otherwise → start fresh
    pub fn get_resume_info(&self) -> ResumeInfo {
        self.read(|state| {
            if !state.resume_from_last_step {
                return fresh();
            }

            let mid_chain = state.completed_steps.iter().find(|(_, data)| {
                data.completed_at.is_none()
                    && data
                        .completed_chains
                        .as_ref()
                        .is_some_and(|chains| !chains.is_empty())
            });
            if let Some((&step_index, data)) = mid_chain {
                let next_chain = data
                    .completed_chains
                    .as_ref()
                    .and_then(|chains| chains.iter().max())
                    .map(|&max| max + 1)
                    .unwrap_or(0);
                return ResumeInfo {
                    start_index: step_index,
                    decision: ResumeDecision::ResumeFromChain,
                    chain_index: Some(next_chain),
                    session_id: data.session(),
                    monitoring_id: Some(data.monitoring()),
                };
            }

            if let Some(&crashed) = state.not_completed_steps.iter().max() {
                return ResumeInfo {
                    start_index: crashed,
                    decision: ResumeDecision::ResumeFromCrash,
                    chain_index: None,
                    session_id: state
                        .completed_steps
                        .get(&crashed)
                        .and_then(StepData::session),
                    monitoring_id: state
                        .completed_steps
                        .get(&crashed)
                        .map(StepData::monitoring),
                };
            }

            let last_completed = state
                .completed_steps
                .iter()
                .filter(|(_, data)| data.completed_at.is_some())
                .map(|(&index, _)| index)
                .max();
            if let Some(last) = last_completed {
                return ResumeInfo {
                    start_index: last + 1,
                    decision: ResumeDecision::ContinueAfterCompleted,
                    chain_index: None,
                    session_id: None,
                    monitoring_id: None,
                };
            }

            fresh()
        })
    }

    // -- template-level settings ----------------------------------------

    pub fn autonomous_mode(&self) -> AutonomousMode {
        self.read(|state| state.autonomous_mode)
    }

    pub fn set_autonomous_mode(&self, mode: AutonomousMode) -> Result<(), TrackingError> {
        self.mutate(|state| state.autonomous_mode = mode)
    }

    pub fn controller_config(&self) -> Option<ControllerConfig> {
        self.read(|state| state.controller_config.clone())
    }

    pub fn set_controller_config(&self, config: ControllerConfig) -> Result<(), TrackingError> {
        self.mutate(|state| state.controller_config = Some(config))
    }

    /// Value for a context placeholder (`project_name` and friends).
    pub fn context_value(&self, name: &str) -> Option<String> {
        self.read(|state| state.context_value(name))
    }

    pub fn snapshot(&self) -> TemplateTracking {
        self.read(Clone::clone)
    }
}

fn fresh() -> ResumeInfo {
    ResumeInfo {
        start_index: 0,
        decision: ResumeDecision::StartFresh,
        chain_index: None,
        session_id: None,
        monitoring_id: None,
    }
}

#[cfg(test)]
#[path = "step_index_tests.rs"]
mod tests;
