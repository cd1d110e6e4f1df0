// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types

use crate::placeholder::PlaceholderError;
use cm_adapters::EngineError;
use cm_core::AgentId;
use cm_storage::TrackingError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from running one step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error("prompt file not found: {0}")]
    PromptNotFound(PathBuf),

    #[error("unknown agent '{0}'")]
    UnknownAgent(AgentId),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl StepError {
    /// Cooperative cancellation, never user-visible as an error.
    pub fn is_abort(&self) -> bool {
        matches!(self, StepError::Engine(e) if e.is_abort())
    }
}

/// Errors that escape the workflow engine's outer boundary.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error("the control channel closed while waiting for input")]
    InputClosed,
}
