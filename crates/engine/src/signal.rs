// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal manager: global pause/skip/stop/mode-change dispatch
//!
//! Owns the abort handle of the step in flight plus its context. Abort
//! semantics are cooperative: the running step honors the signal through
//! the process supervisor's abort path; nothing is killed from here
//! directly.

use crate::control::{ControlChannel, ControlMessage, SignalKind};
use crate::emitter::Emitter;
use crate::mode::ModeManager;
use crate::monitor::AgentMonitor;
use cm_adapters::{AbortHandle, AbortSignal};
use cm_core::{AgentId, MonitoringId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The step currently in flight.
#[derive(Debug, Clone)]
pub struct ActiveStep {
    pub step_index: usize,
    pub agent_id: AgentId,
    pub agent_name: String,
    pub monitoring_id: Option<MonitoringId>,
    abort: AbortHandle,
}

/// Global interrupt dispatcher.
pub struct SignalManager {
    mode: Arc<ModeManager>,
    monitor: Arc<AgentMonitor>,
    emitter: Emitter,
    active: Mutex<Option<ActiveStep>>,
    stop_requested: AtomicBool,
    shutting_down: AtomicBool,
}

impl SignalManager {
    pub fn new(mode: Arc<ModeManager>, monitor: Arc<AgentMonitor>, emitter: Emitter) -> Self {
        Self {
            mode,
            monitor,
            emitter,
            active: Mutex::new(None),
            stop_requested: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Register the step about to run; returns its abort signal.
    pub fn begin_step(
        &self,
        step_index: usize,
        agent_id: AgentId,
        agent_name: impl Into<String>,
    ) -> AbortSignal {
        let abort = AbortHandle::new();
        let signal = abort.signal();
        *self.active.lock() = Some(ActiveStep {
            step_index,
            agent_id,
            agent_name: agent_name.into(),
            monitoring_id: None,
            abort,
        });
        signal
    }

    /// Attach the monitor id once the step runner registered the agent.
    pub fn set_active_monitoring(&self, id: MonitoringId) {
        if let Some(active) = self.active.lock().as_mut() {
            active.monitoring_id = Some(id);
        }
    }

    pub fn end_step(&self) {
        *self.active.lock() = None;
    }

    pub fn active_step(&self) -> Option<ActiveStep> {
        self.active.lock().clone()
    }

    /// Apply one signal. Each handler composes mode, monitor, and abort.
    pub fn dispatch(&self, signal: &SignalKind) {
        match signal {
            SignalKind::Pause => {
                tracing::debug!("signal: pause");
                self.mode.pause();
                self.pause_active_agent();
                self.abort_active();
            }
            SignalKind::Skip => {
                tracing::debug!("signal: skip");
                self.abort_active();
            }
            SignalKind::Stop => {
                tracing::debug!("signal: stop");
                self.stop_requested.store(true, Ordering::SeqCst);
                self.mode.pause();
                self.pause_active_agent();
                self.abort_active();
                self.emitter.workflow_stopped(Some("stopped by user"));
            }
            SignalKind::ModeChange { auto_mode } => {
                tracing::debug!(auto_mode, "signal: mode change");
                self.mode.set_auto_mode(*auto_mode);
            }
        }
    }

    /// Run a background task feeding control-channel signals into
    /// [`SignalManager::dispatch`].
    pub fn spawn_dispatcher(
        self: &Arc<Self>,
        control: &ControlChannel,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut rx = control.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ControlMessage::Signal(signal)) => manager.dispatch(&signal),
                    Ok(_) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Whether a stop signal was dispatched this run.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// On SIGINT the process is winding down; error/warn noise from
    /// cancelled work is suppressed to keep exit clean.
    pub fn set_shutting_down(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    fn pause_active_agent(&self) {
        let monitoring_id = self.active.lock().as_ref().and_then(|a| a.monitoring_id);
        if let Some(id) = monitoring_id {
            self.monitor.mark_paused(id);
        }
    }

    fn abort_active(&self) {
        if let Some(active) = self.active.lock().as_ref() {
            active.abort.abort();
        }
    }
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
