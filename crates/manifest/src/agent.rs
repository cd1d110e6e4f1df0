// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent definitions

use cm_core::{AgentId, EngineId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Role of an agent within a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// A regular pipeline agent, executed when its step is reached.
    #[default]
    Regular,
    /// The always-on agent that can drive the workflow autonomously.
    Controller,
}

/// Reasoning effort hint passed through to engines that support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReasoningEffort::Low => write!(f, "low"),
            ReasoningEffort::Medium => write!(f, "medium"),
            ReasoningEffort::High => write!(f, "high"),
        }
    }
}

/// One prompt source or an ordered list of them.
///
/// Accepts either:
///   `prompt_path = "prompts/plan.md"`              — single path
///   `prompt_path = ["prompts/a.md", "prompts/b.md"]` — ordered list
///
/// Paths resolve against the imports directory first, then the working dir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptPath {
    Single(PathBuf),
    Many(Vec<PathBuf>),
}

impl PromptPath {
    pub fn paths(&self) -> Vec<&PathBuf> {
        match self {
            PromptPath::Single(p) => vec![p],
            PromptPath::Many(ps) => ps.iter().collect(),
        }
    }
}

/// Static description of an agent, keyed by id in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Injected from the manifest map key during parsing.
    #[serde(default, skip)]
    pub id: AgentId,
    /// Human-readable name; defaults to the id when absent.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: AgentRole,
    /// Default engine; the registry default applies when absent.
    #[serde(default)]
    pub engine: Option<EngineId>,
    /// Default model; the engine's default applies when absent.
    #[serde(default)]
    pub model: Option<String>,
    pub prompt_path: PromptPath,
    #[serde(default)]
    pub model_reasoning_effort: Option<ReasoningEffort>,
    /// Recovery agent to run first when this agent's step is detected
    /// incomplete on a later run.
    #[serde(default)]
    pub not_completed_fallback: Option<AgentId>,
    /// Additional user-turn prompts fed one at a time when the user
    /// continues with empty input.
    #[serde(default)]
    pub chained_prompts: Vec<PathBuf>,
}

impl AgentDefinition {
    pub fn is_controller(&self) -> bool {
        self.role == AgentRole::Controller
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
