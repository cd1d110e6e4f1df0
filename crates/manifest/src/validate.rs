// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manifest validation

use crate::parser::Manifest;
use crate::workflow::{StepBehavior, WorkflowStep};
use cm_core::AgentId;
use thiserror::Error;

/// Validation failures that make a manifest unusable.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("workflow '{workflow}' step {step} references unknown agent '{agent}'")]
    UnknownAgent {
        workflow: String,
        step: usize,
        agent: AgentId,
    },

    #[error("workflow '{workflow}' declares unknown controller agent '{agent}'")]
    UnknownController { workflow: String, agent: AgentId },

    #[error("agent '{agent}' names unknown fallback agent '{fallback}'")]
    UnknownFallback { agent: AgentId, fallback: AgentId },

    #[error("workflow '{workflow}' step {step}: loop steps_back must be at least 1")]
    ZeroStepsBack { workflow: String, step: usize },

    #[error("workflow '{workflow}' step {step}: loop max_iterations must be at least 1")]
    ZeroMaxIterations { workflow: String, step: usize },

    #[error("workflow '{workflow}' has no steps")]
    EmptyWorkflow { workflow: String },
}

/// Check cross-references and step shapes after parsing.
pub fn validate_manifest(manifest: &Manifest) -> Result<(), ValidationError> {
    for (name, workflow) in &manifest.workflows {
        if workflow.steps.is_empty() {
            return Err(ValidationError::EmptyWorkflow {
                workflow: name.clone(),
            });
        }
        for (index, step) in workflow.steps.iter().enumerate() {
            let WorkflowStep::Module(module) = step else {
                continue;
            };
            if manifest.get_agent(&module.agent).is_none() {
                return Err(ValidationError::UnknownAgent {
                    workflow: name.clone(),
                    step: index,
                    agent: module.agent.clone(),
                });
            }
            if let Some(fallback) = &module.not_completed_fallback {
                if manifest.get_agent(fallback).is_none() {
                    return Err(ValidationError::UnknownFallback {
                        agent: module.agent.clone(),
                        fallback: fallback.clone(),
                    });
                }
            }
            if let Some(StepBehavior::Loop {
                max_iterations,
                steps_back,
            }) = &module.behavior
            {
                if *steps_back == 0 {
                    return Err(ValidationError::ZeroStepsBack {
                        workflow: name.clone(),
                        step: index,
                    });
                }
                if *max_iterations == 0 {
                    return Err(ValidationError::ZeroMaxIterations {
                        workflow: name.clone(),
                        step: index,
                    });
                }
            }
        }
        if let Some(controller) = &workflow.controller {
            if manifest.get_agent(&controller.agent_id).is_none() {
                return Err(ValidationError::UnknownController {
                    workflow: name.clone(),
                    agent: controller.agent_id.clone(),
                });
            }
        }
    }
    for agent in manifest.agents.values() {
        if let Some(fallback) = &agent.not_completed_fallback {
            if manifest.agents.get(fallback.as_str()).is_none() {
                return Err(ValidationError::UnknownFallback {
                    agent: agent.id.clone(),
                    fallback: fallback.clone(),
                });
            }
        }
    }
    Ok(())
}
