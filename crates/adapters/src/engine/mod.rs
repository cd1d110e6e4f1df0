// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine adapter contract
//!
//! One adapter per LLM CLI. The contract is uniform: build the invocation,
//! check auth, hand the child to the process supervisor in pipe mode, and
//! map the engine's native stream format into three outputs — rendered
//! lines, telemetry updates, and a session id captured once.
//!
//! # ID hierarchy
//!
//! ```text
//! agent id (manifest)  — stable across runs
//!      │
//!      └── monitoring id  — one per spawned run (assigned by the monitor)
//!               │
//!               └── session id  — engine-assigned, enables resume
//! ```

mod claude;
mod codex;
mod gemini;
mod mistral;

pub use claude::ClaudeEngine;
pub use codex::CodexEngine;
pub use gemini::GeminiEngine;
pub use mistral::MistralEngine;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use crate::abort::AbortSignal;
use crate::process::SupervisorError;
use cm_core::{EngineId, SessionId, Telemetry};
use cm_manifest::ReasoningEffort;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from engine runs.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    NotInstalled(String),

    #[error("authentication required: {0}")]
    Auth(String),

    #[error("engine reported an error: {0}")]
    Stream(String),

    #[error("engine exited with code {code}{}", format_stderr(.stderr))]
    Exit { code: i32, stderr: String },

    #[error("aborted")]
    Aborted,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unknown engine '{0}'")]
    UnknownEngine(EngineId),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl EngineError {
    /// True for cooperative cancellation, which is never user-visible as an
    /// error.
    pub fn is_abort(&self) -> bool {
        matches!(self, EngineError::Aborted)
    }
}

impl From<SupervisorError> for EngineError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::BinaryNotFound { .. } => EngineError::NotInstalled(err.to_string()),
            SupervisorError::Aborted => EngineError::Aborted,
            SupervisorError::Timeout(d) => EngineError::Timeout(d),
            SupervisorError::Spawn { .. } => {
                EngineError::Io(std::io::Error::other(err.to_string()))
            }
            SupervisorError::Io(e) => EngineError::Io(e),
        }
    }
}

/// Static description of an engine.
#[derive(Debug, Clone)]
pub struct EngineMetadata {
    pub id: EngineId,
    pub name: &'static str,
    /// CLI binary looked up on PATH.
    pub binary: &'static str,
    /// One-line installation hint shown when the binary is missing.
    pub install_hint: &'static str,
    pub default_model: &'static str,
    pub supported_models: &'static [&'static str],
    pub default_reasoning_effort: Option<ReasoningEffort>,
    pub supports_mcp: bool,
}

/// One engine invocation.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub prompt: String,
    pub working_dir: PathBuf,
    pub model: String,
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Resume this session instead of opening a new one.
    pub resume_session: Option<SessionId>,
    pub timeout: Duration,
    pub abort: AbortSignal,
}

impl RunRequest {
    pub fn new(prompt: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompt: prompt.into(),
            working_dir: working_dir.into(),
            model: String::new(),
            reasoning_effort: None,
            resume_session: None,
            timeout: crate::env::run_timeout(),
            abort: AbortSignal::never(),
        }
    }
}

/// Sinks for the three streams every adapter produces.
///
/// All callbacks for one run are invoked from a single task in stream
/// order; `on_session_id` fires at most once.
pub struct RunCallbacks<'a> {
    pub on_line: &'a mut (dyn FnMut(&str) + Send),
    pub on_error_line: &'a mut (dyn FnMut(&str) + Send),
    pub on_telemetry: &'a mut (dyn FnMut(&Telemetry) + Send),
    pub on_session_id: &'a mut (dyn FnMut(&SessionId) + Send),
}


/// Result of a completed engine run.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    /// The engine's final assistant text (directives may trail here).
    pub final_text: String,
    pub session_id: Option<SessionId>,
    pub telemetry: Telemetry,
}

/// Per-workspace MCP client configuration for an engine.
pub trait McpIntegration: Send + Sync {
    fn supported(&self) -> bool;
    /// Install client config exposing the workspace's MCP backends to the
    /// engine.
    fn configure(&self, workflow_dir: &Path) -> std::io::Result<()>;
    fn cleanup(&self, workflow_dir: &Path) -> std::io::Result<()>;
    fn is_configured(&self, workflow_dir: &Path) -> bool;
}

/// Credential management for an engine.
pub trait EngineAuth: Send + Sync {
    fn is_authenticated(&self) -> bool;
    /// Fail with a clear message when credentials are missing (unless
    /// `CODEMACHINE_SKIP_AUTH` is set).
    fn ensure_auth(&self) -> Result<(), EngineError>;
    fn clear_auth(&self) -> std::io::Result<()>;
}

/// Uniform contract over each LLM CLI.
#[async_trait::async_trait]
pub trait EngineAdapter: Send + Sync {
    fn metadata(&self) -> &EngineMetadata;

    /// Run the engine to completion, streaming through `callbacks`.
    ///
    /// Any non-zero exit, or an in-stream error record that still exits 0
    /// (rate limits, invalid model), surfaces as a single [`EngineError`].
    async fn run(
        &self,
        request: RunRequest,
        callbacks: &mut RunCallbacks<'_>,
    ) -> Result<EngineOutput, EngineError>;

    fn mcp(&self) -> Option<&dyn McpIntegration> {
        None
    }

    fn auth(&self) -> Option<&dyn EngineAuth> {
        None
    }
}

impl std::fmt::Debug for dyn EngineAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineAdapter")
            .field("metadata", self.metadata())
            .finish()
    }
}

/// Process-wide engine registry.
pub struct EngineRegistry {
    engines: HashMap<EngineId, Arc<dyn EngineAdapter>>,
    default_id: EngineId,
}

impl EngineRegistry {
    pub fn new(default_id: EngineId) -> Self {
        Self {
            engines: HashMap::new(),
            default_id,
        }
    }

    /// Registry with all built-in engines, claude as the default.
    pub fn standard() -> Self {
        let mut registry = Self::new(EngineId::new("claude"));
        registry.register(Arc::new(ClaudeEngine::new()));
        registry.register(Arc::new(CodexEngine::new()));
        registry.register(Arc::new(GeminiEngine::new()));
        registry.register(Arc::new(MistralEngine::new()));
        registry
    }

    pub fn register(&mut self, engine: Arc<dyn EngineAdapter>) {
        self.engines.insert(engine.metadata().id.clone(), engine);
    }

    pub fn get(&self, id: &EngineId) -> Option<Arc<dyn EngineAdapter>> {
        self.engines.get(id).cloned()
    }

    pub fn default_id(&self) -> &EngineId {
        &self.default_id
    }

    pub fn set_default(&mut self, id: EngineId) {
        self.default_id = id;
    }

    /// Resolve an optional override to an adapter, falling back to the
    /// registry default.
    pub fn resolve(&self, id: Option<&EngineId>) -> Result<Arc<dyn EngineAdapter>, EngineError> {
        let id = id.unwrap_or(&self.default_id);
        self.get(id)
            .ok_or_else(|| EngineError::UnknownEngine(id.clone()))
    }

    pub fn ids(&self) -> Vec<EngineId> {
        let mut ids: Vec<EngineId> = self.engines.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
