// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input provider strategy
//!
//! Between steps, someone has to produce the next user-style instruction:
//! the terminal user, the prompt queue, or the controller agent. Providers
//! implement one small interface; the mode manager decides which one is
//! active and swaps them with deactivate-then-activate discipline.

mod controller;
mod user;

pub use controller::{ControllerInputProvider, ControllerSession};
pub use user::UserInputProvider;

use cm_core::MonitoringId;
use std::path::Path;
use thiserror::Error;

/// Sentinel input value: the user asked to switch to autonomous mode; the
/// outer loop rebuilds the active provider and retries.
pub const SWITCH_TO_AUTO: &str = "__SWITCH_TO_AUTO__";

/// Who produced an input value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    User,
    Queue,
    Controller,
}

impl InputSource {
    pub fn as_str(self) -> &'static str {
        match self {
            InputSource::User => "user",
            InputSource::Queue => "queue",
            InputSource::Controller => "controller",
        }
    }
}

/// What a provider resolved with.
#[derive(Debug, Clone, PartialEq)]
pub enum InputResult {
    Input {
        value: String,
        resume_monitoring_id: Option<MonitoringId>,
        source: InputSource,
    },
    Skip,
    Stop,
}

/// Context handed to a provider for one input request.
#[derive(Debug, Clone, Copy)]
pub struct InputContext<'a> {
    pub step_index: usize,
    pub unique_agent_id: &'a str,
    /// The just-finished step's final output, when there is one.
    pub step_output: Option<&'a str>,
    /// The step's chained-prompt queue (already loaded contents).
    pub queue: &'a [String],
    pub queue_index: usize,
    pub working_dir: &'a Path,
}

/// Provider failures.
#[derive(Debug, Error)]
pub enum InputError {
    /// The pending wait was dropped without producing a result.
    #[error("input wait aborted")]
    Aborted,

    #[error("the control channel closed")]
    ChannelClosed,

    #[error("controller turn failed: {0}")]
    Controller(String),
}

/// Strategy for producing the next user-style input.
#[async_trait::async_trait]
pub trait InputProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Wait for the next input. Must resolve with `Err(Aborted)` rather
    /// than hanging when [`InputProvider::abort`] is called.
    async fn get_input(&self, ctx: InputContext<'_>) -> Result<InputResult, InputError>;

    fn activate(&self) {}

    fn deactivate(&self) {}

    /// Drop any pending `get_input` without producing an [`InputResult`].
    fn abort(&self) {}
}
