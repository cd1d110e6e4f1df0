// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manifest parsing (TOML, HCL, and JSON)

use crate::agent::AgentDefinition;
use crate::placeholder_config::PlaceholderConfig;
use crate::validate::{validate_manifest, ValidationError};
use crate::workflow::{WorkflowStep, WorkflowTemplate};
use cm_core::{AgentId, EngineId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Manifest file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Hcl,
    Json,
}

impl Format {
    /// Infer the format from a file extension; TOML is the default.
    pub fn from_path(path: &Path) -> Format {
        match path.extension().and_then(|e| e.to_str()) {
            Some("hcl") => Format::Hcl,
            Some("json") => Format::Json,
            _ => Format::Toml,
        }
    }
}

/// Errors that can occur during manifest parsing
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HCL parse error: {0}")]
    Hcl(#[from] hcl::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A parsed manifest: agents, workflow templates, placeholder sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, alias = "agent")]
    pub agents: IndexMap<String, AgentDefinition>,
    #[serde(default, alias = "workflow")]
    pub workflows: IndexMap<String, WorkflowTemplate>,
    #[serde(default)]
    pub placeholders: PlaceholderConfig,
    /// Engine used when neither a step nor its agent names one.
    #[serde(default)]
    pub default_engine: Option<EngineId>,
}

impl Manifest {
    /// Get an agent definition by id
    pub fn get_agent(&self, id: &AgentId) -> Option<&AgentDefinition> {
        self.agents.get(id.as_str())
    }

    /// Get a workflow template by name
    pub fn get_workflow(&self, name: &str) -> Option<&WorkflowTemplate> {
        self.workflows.get(name)
    }

    /// The single workflow, when exactly one is defined.
    pub fn sole_workflow(&self) -> Option<&WorkflowTemplate> {
        if self.workflows.len() == 1 {
            self.workflows.values().next()
        } else {
            None
        }
    }

    /// Engines a template will use, deduplicated in first-appearance order.
    ///
    /// Resolution per step: step override, else agent config, else the
    /// registry default. Used to drive per-engine MCP configure/cleanup.
    pub fn referenced_engines(
        &self,
        template: &WorkflowTemplate,
        default_engine: &EngineId,
    ) -> Vec<EngineId> {
        let mut engines: Vec<EngineId> = Vec::new();
        let mut push = |id: EngineId| {
            if !engines.contains(&id) {
                engines.push(id);
            }
        };
        for step in &template.steps {
            if let WorkflowStep::Module(module) = step {
                let agent_engine = self
                    .get_agent(&module.agent)
                    .and_then(|a| a.engine.clone());
                push(
                    module
                        .engine
                        .clone()
                        .or(agent_engine)
                        .unwrap_or_else(|| default_engine.clone()),
                );
            }
        }
        if let Some(controller) = &template.controller {
            let agent_engine = self
                .get_agent(&controller.agent_id)
                .and_then(|a| a.engine.clone());
            push(
                controller
                    .options
                    .engine
                    .clone()
                    .or(agent_engine)
                    .unwrap_or_else(|| default_engine.clone()),
            );
        }
        engines
    }
}

/// Parse a manifest from TOML content (convenience wrapper)
pub fn parse_manifest(content: &str) -> Result<Manifest, ParseError> {
    parse_manifest_with_format(content, Format::Toml)
}

/// Parse a manifest from the given content in the specified format
pub fn parse_manifest_with_format(content: &str, format: Format) -> Result<Manifest, ParseError> {
    // 1. Serde does the heavy lifting
    let mut manifest: Manifest = match format {
        Format::Toml => toml::from_str(content)?,
        Format::Hcl => hcl::from_str(content)?,
        Format::Json => serde_json::from_str(content)?,
    };

    // 2. Name fixup — inject map keys into .id/.name fields
    for (id, agent) in &mut manifest.agents {
        agent.id = AgentId::new(id.clone());
        if agent.name.is_empty() {
            agent.name = id.clone();
        }
    }
    for (name, workflow) in &mut manifest.workflows {
        workflow.name = name.clone();
    }

    // 3. Cross-reference and shape validation
    validate_manifest(&manifest)?;

    Ok(manifest)
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
