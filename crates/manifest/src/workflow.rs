// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow template definitions

use crate::agent::PromptPath;
use cm_core::{AgentId, AutonomousMode, EngineId};
use serde::{Deserialize, Serialize};

/// Engine/model overrides for the controller agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerOptions {
    #[serde(default)]
    pub engine: Option<EngineId>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Controller declaration on a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerDecl {
    pub agent_id: AgentId,
    #[serde(default)]
    pub options: ControllerOptions,
}

/// Declared post-step behavior of a module step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepBehavior {
    Loop {
        max_iterations: u32,
        steps_back: usize,
    },
    Checkpoint,
}

/// A step that executes an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleStep {
    /// References an [`crate::AgentDefinition`] by id.
    pub agent: AgentId,
    #[serde(default)]
    pub engine: Option<EngineId>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt_path: Option<PromptPath>,
    /// Completed steps with this flag are never re-executed, even when a
    /// loop rewinds over them.
    #[serde(default)]
    pub execute_once: bool,
    #[serde(default)]
    pub not_completed_fallback: Option<AgentId>,
    #[serde(default)]
    pub behavior: Option<StepBehavior>,
}

/// A pure display element in the pipeline; never executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiStep {
    pub label: String,
}

/// One entry in a template's ordered step list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkflowStep {
    Module(ModuleStep),
    Ui(UiStep),
}

impl WorkflowStep {
    pub fn as_module(&self) -> Option<&ModuleStep> {
        match self {
            WorkflowStep::Module(m) => Some(m),
            WorkflowStep::Ui(_) => None,
        }
    }
}

/// A named, ordered pipeline of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    /// Injected from the manifest map key during parsing.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub autonomous_mode: Option<AutonomousMode>,
    #[serde(default)]
    pub controller: Option<ControllerDecl>,
    /// Agent ids mirrored into the workspace for sub-agent use.
    #[serde(default)]
    pub sub_agent_ids: Vec<AgentId>,
    /// Onboarding track names offered on first run.
    #[serde(default)]
    pub tracks: Vec<String>,
    /// Onboarding condition groups offered on first run.
    #[serde(default)]
    pub condition_groups: Vec<String>,
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
