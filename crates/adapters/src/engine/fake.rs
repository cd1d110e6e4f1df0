// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted engine adapter for tests
//!
//! Each queued [`FakeRun`] is consumed by one `run` call: its lines stream
//! through the callbacks in order, then the run resolves per its outcome.
//! When the script is empty, runs succeed with a generated session id.

use super::{
    EngineAdapter, EngineError, EngineMetadata, EngineOutput, RunCallbacks, RunRequest,
};
use cm_core::{EngineId, SessionId, Telemetry};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// How a scripted run ends.
#[derive(Debug, Clone, Default)]
pub enum FakeOutcome {
    #[default]
    Success,
    StreamError(String),
    /// Block until the abort signal fires, then fail with `Aborted`.
    HangUntilAbort,
}

/// One scripted engine run.
#[derive(Debug, Clone, Default)]
pub struct FakeRun {
    pub lines: Vec<String>,
    pub telemetry: Option<Telemetry>,
    pub session_id: Option<SessionId>,
    pub final_text: String,
    pub outcome: FakeOutcome,
}

impl FakeRun {
    pub fn completing(final_text: impl Into<String>) -> Self {
        Self {
            final_text: final_text.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session_id = Some(SessionId::new(session));
        self
    }

    pub fn with_lines(mut self, lines: &[&str]) -> Self {
        self.lines = lines.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: FakeOutcome::StreamError(message.into()),
            ..Default::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            outcome: FakeOutcome::HangUntilAbort,
            ..Default::default()
        }
    }
}

/// Record of one observed `run` call.
#[derive(Debug, Clone)]
pub struct FakeCall {
    pub prompt: String,
    pub model: String,
    pub resume_session: Option<SessionId>,
}

/// Scripted [`EngineAdapter`].
pub struct FakeEngine {
    metadata: EngineMetadata,
    script: Mutex<VecDeque<FakeRun>>,
    calls: Mutex<Vec<FakeCall>>,
    session_counter: Mutex<u64>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::with_id("fake")
    }

    pub fn with_id(id: &str) -> Self {
        Self {
            metadata: EngineMetadata {
                id: EngineId::new(id),
                name: "Fake Engine",
                binary: "fake-engine",
                install_hint: "test-only engine, nothing to install",
                default_model: "fake-model",
                supported_models: &["fake-model"],
                default_reasoning_effort: None,
                supports_mcp: false,
            },
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            session_counter: Mutex::new(0),
        }
    }

    pub fn enqueue(&self, run: FakeRun) {
        self.script.lock().push_back(run);
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl EngineAdapter for FakeEngine {
    fn metadata(&self) -> &EngineMetadata {
        &self.metadata
    }

    async fn run(
        &self,
        request: RunRequest,
        callbacks: &mut RunCallbacks<'_>,
    ) -> Result<EngineOutput, EngineError> {
        self.calls.lock().push(FakeCall {
            prompt: request.prompt.clone(),
            model: request.model.clone(),
            resume_session: request.resume_session.clone(),
        });

        let run = self.script.lock().pop_front().unwrap_or_else(|| {
            let mut counter = self.session_counter.lock();
            *counter += 1;
            FakeRun::completing("").with_session(format!("fake-session-{}", *counter))
        });

        if let FakeOutcome::HangUntilAbort = run.outcome {
            request.abort.cancelled().await;
            return Err(EngineError::Aborted);
        }

        let session_id = run
            .session_id
            .clone()
            .or_else(|| request.resume_session.clone());
        if let Some(session) = &session_id {
            (callbacks.on_session_id)(session);
        }
        for line in &run.lines {
            (callbacks.on_line)(line);
        }
        let telemetry = run.telemetry.clone().unwrap_or_default();
        if run.telemetry.is_some() {
            (callbacks.on_telemetry)(&telemetry);
        }

        match run.outcome {
            FakeOutcome::StreamError(message) => Err(EngineError::Stream(message)),
            _ => Ok(EngineOutput {
                final_text: run.final_text,
                session_id,
                telemetry,
            }),
        }
    }
}
