// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Manifest parsing and workflow definitions

mod agent;
mod parser;
mod placeholder_config;
mod validate;
mod workflow;

pub use agent::{AgentDefinition, AgentRole, PromptPath, ReasoningEffort};
pub use parser::{parse_manifest, parse_manifest_with_format, Format, Manifest, ParseError};
pub use placeholder_config::{PlaceholderConfig, PlaceholderSource};
pub use validate::ValidationError;
pub use cm_core::AutonomousMode;
pub use workflow::{
    ControllerDecl, ControllerOptions, ModuleStep, StepBehavior, UiStep, WorkflowStep,
    WorkflowTemplate,
};
