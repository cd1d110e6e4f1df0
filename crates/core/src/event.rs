// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event vocabulary the engine publishes
//!
//! The engine never talks to a UI directly; it emits these events on the bus
//! and any front-end subscribes. Serializes with `{"type": "domain:name"}`
//! tags so events can be captured in bug reports and replayed in tests.

use crate::agent::AgentStatus;
use crate::id::{AgentId, EngineId, MonitoringId};
use crate::session::SessionId;
use crate::telemetry::Telemetry;
use serde::{Deserialize, Serialize};

/// Overall workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Stopped,
    Error,
}

/// Which top-level view the UI should present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewName {
    Controller,
    Executing,
}

/// State of the free-form input prompt between steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputState {
    Idle,
    Waiting,
    Received { source: String },
}

/// Events that decouple the engine from any UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- workflow --
    #[serde(rename = "workflow:started")]
    WorkflowStarted { template: String },

    #[serde(rename = "workflow:status")]
    WorkflowStatus { status: WorkflowStatus },

    #[serde(rename = "workflow:stopped")]
    WorkflowStopped {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    #[serde(rename = "workflow:error")]
    WorkflowError { reason: String },

    #[serde(rename = "workflow:step-started")]
    StepStarted {
        step_index: usize,
        agent_id: AgentId,
    },

    #[serde(rename = "workflow:step-skipped")]
    StepSkipped {
        step_index: usize,
        agent_id: AgentId,
    },

    #[serde(rename = "workflow:step-completed")]
    StepCompleted { step_index: usize },

    // -- agent --
    #[serde(rename = "agent:added")]
    AgentAdded {
        id: MonitoringId,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<MonitoringId>,
        engine: EngineId,
        model: String,
    },

    #[serde(rename = "agent:status")]
    AgentStatus { id: MonitoringId, status: AgentStatus },

    #[serde(rename = "agent:telemetry")]
    AgentTelemetry {
        id: MonitoringId,
        telemetry: Telemetry,
    },

    #[serde(rename = "agent:session")]
    AgentSession {
        id: MonitoringId,
        session_id: SessionId,
    },

    #[serde(rename = "agent:reset")]
    AgentReset { id: MonitoringId },

    // -- subagents / triggered agents --
    #[serde(rename = "subagent:added")]
    SubagentAdded {
        id: MonitoringId,
        parent: MonitoringId,
    },

    #[serde(rename = "subagent:cleared")]
    SubagentsCleared { parent: MonitoringId },

    #[serde(rename = "triggered:added")]
    TriggeredAdded {
        id: MonitoringId,
        parent: MonitoringId,
        agent_id: AgentId,
    },

    // -- loop / checkpoint --
    #[serde(rename = "loop:state")]
    LoopState {
        source_agent: AgentId,
        iteration: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u32>,
        back_steps: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    #[serde(rename = "loop:clear")]
    LoopCleared,

    #[serde(rename = "checkpoint:state")]
    CheckpointState {
        step_index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    #[serde(rename = "checkpoint:clear")]
    CheckpointCleared,

    // -- streaming / monitor --
    #[serde(rename = "message:log")]
    MessageLog { id: MonitoringId, line: String },

    #[serde(rename = "ui:element")]
    UiElement { step_index: usize, label: String },

    #[serde(rename = "monitor:register")]
    MonitorRegister {
        id: MonitoringId,
        unique_agent_id: String,
    },

    // -- controller --
    #[serde(rename = "controller:info")]
    ControllerInfo {
        agent_id: AgentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },

    #[serde(rename = "controller:status")]
    ControllerStatus { status: AgentStatus },

    // -- input / mode / view --
    #[serde(rename = "input:state")]
    InputStateSet { state: InputState },

    #[serde(rename = "mode:changed")]
    ModeChanged { auto_mode: bool },

    #[serde(rename = "view:change")]
    ViewChanged { view: ViewName },
}

/// Fieldless tag for typed subscriptions and history filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WorkflowStarted,
    WorkflowStatus,
    WorkflowStopped,
    WorkflowError,
    StepStarted,
    StepSkipped,
    StepCompleted,
    AgentAdded,
    AgentStatus,
    AgentTelemetry,
    AgentSession,
    AgentReset,
    SubagentAdded,
    SubagentsCleared,
    TriggeredAdded,
    LoopState,
    LoopCleared,
    CheckpointState,
    CheckpointCleared,
    MessageLog,
    UiElement,
    MonitorRegister,
    ControllerInfo,
    ControllerStatus,
    InputStateSet,
    ModeChanged,
    ViewChanged,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::WorkflowStarted { .. } => EventKind::WorkflowStarted,
            Event::WorkflowStatus { .. } => EventKind::WorkflowStatus,
            Event::WorkflowStopped { .. } => EventKind::WorkflowStopped,
            Event::WorkflowError { .. } => EventKind::WorkflowError,
            Event::StepStarted { .. } => EventKind::StepStarted,
            Event::StepSkipped { .. } => EventKind::StepSkipped,
            Event::StepCompleted { .. } => EventKind::StepCompleted,
            Event::AgentAdded { .. } => EventKind::AgentAdded,
            Event::AgentStatus { .. } => EventKind::AgentStatus,
            Event::AgentTelemetry { .. } => EventKind::AgentTelemetry,
            Event::AgentSession { .. } => EventKind::AgentSession,
            Event::AgentReset { .. } => EventKind::AgentReset,
            Event::SubagentAdded { .. } => EventKind::SubagentAdded,
            Event::SubagentsCleared { .. } => EventKind::SubagentsCleared,
            Event::TriggeredAdded { .. } => EventKind::TriggeredAdded,
            Event::LoopState { .. } => EventKind::LoopState,
            Event::LoopCleared => EventKind::LoopCleared,
            Event::CheckpointState { .. } => EventKind::CheckpointState,
            Event::CheckpointCleared => EventKind::CheckpointCleared,
            Event::MessageLog { .. } => EventKind::MessageLog,
            Event::UiElement { .. } => EventKind::UiElement,
            Event::MonitorRegister { .. } => EventKind::MonitorRegister,
            Event::ControllerInfo { .. } => EventKind::ControllerInfo,
            Event::ControllerStatus { .. } => EventKind::ControllerStatus,
            Event::InputStateSet { .. } => EventKind::InputStateSet,
            Event::ModeChanged { .. } => EventKind::ModeChanged,
            Event::ViewChanged { .. } => EventKind::ViewChanged,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
