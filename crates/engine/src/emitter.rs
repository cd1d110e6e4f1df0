// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain-level emitter over the event bus

use crate::bus::EventBus;
use cm_core::{
    AgentId, AgentStatus, Event, EngineId, InputState, MonitoringId, SessionId, Telemetry,
    ViewName, WorkflowStatus,
};
use std::sync::Arc;

/// Wraps the bus with the engine's event vocabulary so call sites stay
/// declarative. The engine is fully usable with only the bus — nothing
/// here talks to a UI directly.
#[derive(Clone)]
pub struct Emitter {
    bus: Arc<EventBus>,
}

impl Emitter {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    // -- workflow --

    pub fn workflow_started(&self, template: &str) {
        self.bus.emit(Event::WorkflowStarted {
            template: template.to_string(),
        });
    }

    pub fn workflow_status(&self, status: WorkflowStatus) {
        self.bus.emit(Event::WorkflowStatus { status });
    }

    pub fn workflow_stopped(&self, reason: Option<&str>) {
        self.bus.emit(Event::WorkflowStopped {
            reason: reason.map(str::to_string),
        });
    }

    pub fn workflow_error(&self, reason: &str) {
        self.bus.emit(Event::WorkflowError {
            reason: reason.to_string(),
        });
    }

    pub fn step_started(&self, step_index: usize, agent_id: &AgentId) {
        self.bus.emit(Event::StepStarted {
            step_index,
            agent_id: agent_id.clone(),
        });
    }

    pub fn step_skipped(&self, step_index: usize, agent_id: &AgentId) {
        self.bus.emit(Event::StepSkipped {
            step_index,
            agent_id: agent_id.clone(),
        });
    }

    pub fn step_completed(&self, step_index: usize) {
        self.bus.emit(Event::StepCompleted { step_index });
    }

    // -- agents --

    #[allow(clippy::too_many_arguments)]
    pub fn agent_added(
        &self,
        id: MonitoringId,
        name: &str,
        parent: Option<MonitoringId>,
        engine: &EngineId,
        model: &str,
    ) {
        self.bus.emit(Event::AgentAdded {
            id,
            name: name.to_string(),
            parent,
            engine: engine.clone(),
            model: model.to_string(),
        });
    }

    pub fn agent_status(&self, id: MonitoringId, status: AgentStatus) {
        self.bus.emit(Event::AgentStatus { id, status });
    }

    pub fn agent_telemetry(&self, id: MonitoringId, telemetry: &Telemetry) {
        self.bus.emit(Event::AgentTelemetry {
            id,
            telemetry: telemetry.clone(),
        });
    }

    pub fn agent_session(&self, id: MonitoringId, session_id: &SessionId) {
        self.bus.emit(Event::AgentSession {
            id,
            session_id: session_id.clone(),
        });
    }

    pub fn agent_reset(&self, id: MonitoringId) {
        self.bus.emit(Event::AgentReset { id });
    }

    pub fn subagent_added(&self, id: MonitoringId, parent: MonitoringId) {
        self.bus.emit(Event::SubagentAdded { id, parent });
    }

    pub fn subagents_cleared(&self, parent: MonitoringId) {
        self.bus.emit(Event::SubagentsCleared { parent });
    }

    pub fn triggered_added(&self, id: MonitoringId, parent: MonitoringId, agent_id: &AgentId) {
        self.bus.emit(Event::TriggeredAdded {
            id,
            parent,
            agent_id: agent_id.clone(),
        });
    }

    // -- loop / checkpoint --

    pub fn loop_state(
        &self,
        source_agent: &AgentId,
        iteration: u32,
        max_iterations: Option<u32>,
        back_steps: usize,
        reason: Option<&str>,
    ) {
        self.bus.emit(Event::LoopState {
            source_agent: source_agent.clone(),
            iteration,
            max_iterations,
            back_steps,
            reason: reason.map(str::to_string),
        });
    }

    pub fn loop_cleared(&self) {
        self.bus.emit(Event::LoopCleared);
    }

    pub fn checkpoint_state(&self, step_index: usize, reason: Option<&str>) {
        self.bus.emit(Event::CheckpointState {
            step_index,
            reason: reason.map(str::to_string),
        });
    }

    pub fn checkpoint_cleared(&self) {
        self.bus.emit(Event::CheckpointCleared);
    }

    // -- streaming / input / view --

    pub fn message_log(&self, id: MonitoringId, line: &str) {
        self.bus.emit(Event::MessageLog {
            id,
            line: line.to_string(),
        });
    }

    pub fn ui_element(&self, step_index: usize, label: &str) {
        self.bus.emit(Event::UiElement {
            step_index,
            label: label.to_string(),
        });
    }

    pub fn monitor_register(&self, id: MonitoringId, unique_agent_id: &str) {
        self.bus.emit(Event::MonitorRegister {
            id,
            unique_agent_id: unique_agent_id.to_string(),
        });
    }

    pub fn controller_info(&self, agent_id: &AgentId, session_id: Option<&SessionId>) {
        self.bus.emit(Event::ControllerInfo {
            agent_id: agent_id.clone(),
            session_id: session_id.cloned(),
        });
    }

    pub fn controller_status(&self, status: AgentStatus) {
        self.bus.emit(Event::ControllerStatus { status });
    }

    pub fn input_waiting(&self) {
        self.bus.emit(Event::InputStateSet {
            state: InputState::Waiting,
        });
    }

    pub fn input_received(&self, source: &str) {
        self.bus.emit(Event::InputStateSet {
            state: InputState::Received {
                source: source.to_string(),
            },
        });
    }

    pub fn input_idle(&self) {
        self.bus.emit(Event::InputStateSet {
            state: InputState::Idle,
        });
    }

    pub fn mode_changed(&self, auto_mode: bool) {
        self.bus.emit(Event::ModeChanged { auto_mode });
    }

    pub fn view_changed(&self, view: ViewName) {
        self.bus.emit(Event::ViewChanged { view });
    }
}
