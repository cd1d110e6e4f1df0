// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters between the workflow engine and the outside world
//!
//! This crate owns the two process boundaries of the system:
//! - the process supervisor, which spawns and streams child processes with
//!   cooperative cancellation and soft-then-hard termination;
//! - the engine adapters, one per LLM CLI, which turn each engine's native
//!   stream format into rendered lines, telemetry, and session ids.

pub mod abort;
pub mod engine;
pub mod env;
pub mod process;
pub mod render;

pub use abort::{AbortHandle, AbortSignal};
pub use engine::{
    EngineAdapter, EngineAuth, EngineError, EngineMetadata, EngineOutput, EngineRegistry,
    McpIntegration, RunCallbacks, RunRequest,
};
pub use process::{ProcessOutput, SpawnSpec, StdioMode, SupervisorError};

#[cfg(any(test, feature = "test-support"))]
pub use engine::fake::{FakeCall, FakeEngine, FakeOutcome, FakeRun};
