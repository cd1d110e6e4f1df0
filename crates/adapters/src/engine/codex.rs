// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex engine adapter
//!
//! Drives `codex exec --json`, which emits one event per line:
//! `session.created`, `item.completed` (agent messages, command executions,
//! reasoning), `turn.completed` (usage), and `error`.

use super::{
    EngineAdapter, EngineAuth, EngineError, EngineMetadata, EngineOutput, RunCallbacks, RunRequest,
};
use crate::env::skip_auth;
use crate::process::{self, SpawnSpec};
use crate::render::{brief, LineRenderer};
use cm_core::{EngineId, SessionId, Telemetry};
use serde_json::Value;

const SUPPORTED_MODELS: &[&str] = &["gpt-5.2-codex", "gpt-5.2", "gpt-5.1-codex-mini"];

/// Adapter for the Codex CLI.
pub struct CodexEngine {
    metadata: EngineMetadata,
    auth: CodexAuth,
}

impl Default for CodexEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CodexEngine {
    pub fn new() -> Self {
        Self {
            metadata: EngineMetadata {
                id: EngineId::new("codex"),
                name: "Codex",
                binary: "codex",
                install_hint: "Install it with: npm install -g @openai/codex",
                default_model: "gpt-5.2-codex",
                supported_models: SUPPORTED_MODELS,
                default_reasoning_effort: Some(cm_manifest::ReasoningEffort::Medium),
                supports_mcp: false,
            },
            auth: CodexAuth,
        }
    }

    fn build_spec(&self, request: &RunRequest) -> SpawnSpec {
        let mut spec = SpawnSpec::new(self.metadata.binary);
        spec.args = vec!["exec".to_string()];
        if let Some(session) = &request.resume_session {
            spec.args.push("resume".to_string());
            spec.args.push(session.to_string());
        }
        spec.args.push("--json".to_string());
        spec.args.push("--skip-git-repo-check".to_string());
        spec.args.push("-m".to_string());
        spec.args.push(request.model.clone());
        if let Some(effort) = request.reasoning_effort {
            spec.args.push("-c".to_string());
            spec.args.push(format!("model_reasoning_effort=\"{effort}\""));
        }
        spec.stdin = Some(request.prompt.clone());
        spec.args.push("-".to_string());
        spec.cwd = Some(request.working_dir.clone());
        spec.timeout = request.timeout;
        spec.install_hint = Some(self.metadata.install_hint.to_string());
        spec
    }
}

#[async_trait::async_trait]
impl EngineAdapter for CodexEngine {
    fn metadata(&self) -> &EngineMetadata {
        &self.metadata
    }

    async fn run(
        &self,
        request: RunRequest,
        callbacks: &mut RunCallbacks<'_>,
    ) -> Result<EngineOutput, EngineError> {
        self.auth.ensure_auth()?;

        let spec = self.build_spec(&request);
        let mut stream = CodexStream::new(LineRenderer::default());

        let RunCallbacks {
            on_line,
            on_error_line,
            on_telemetry,
            on_session_id,
        } = callbacks;

        let output = process::run(
            spec,
            |line| {
                let effects = stream.parse_line(line);
                for rendered in effects.rendered {
                    on_line(&rendered);
                }
                if effects.telemetry_updated {
                    on_telemetry(&stream.telemetry);
                }
                if let Some(session) = effects.session_discovered {
                    on_session_id(&session);
                }
            },
            |line| on_error_line(line),
            &request.abort,
        )
        .await?;

        if output.exit_code != 0 {
            return Err(EngineError::Exit {
                code: output.exit_code,
                stderr: output.stderr,
            });
        }
        if let Some(error) = stream.error {
            return Err(EngineError::Stream(error));
        }

        Ok(EngineOutput {
            final_text: stream.final_text,
            session_id: stream.session_id,
            telemetry: stream.telemetry,
        })
    }

    fn auth(&self) -> Option<&dyn EngineAuth> {
        Some(&self.auth)
    }
}

#[derive(Debug, Default)]
struct ParseEffects {
    rendered: Vec<String>,
    telemetry_updated: bool,
    session_discovered: Option<SessionId>,
}

struct CodexStream {
    renderer: LineRenderer,
    session_id: Option<SessionId>,
    telemetry: Telemetry,
    final_text: String,
    error: Option<String>,
}

impl CodexStream {
    fn new(renderer: LineRenderer) -> Self {
        Self {
            renderer,
            session_id: None,
            telemetry: Telemetry::default(),
            final_text: String::new(),
            error: None,
        }
    }

    fn parse_line(&mut self, line: &str) -> ParseEffects {
        let mut effects = ParseEffects::default();
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return effects;
        }
        let Ok(event) = serde_json::from_str::<Value>(trimmed) else {
            effects.rendered.push(line.to_string());
            return effects;
        };

        match event.get("type").and_then(|t| t.as_str()) {
            Some("session.created") => {
                if let Some(session) = event.get("session_id").and_then(|v| v.as_str()) {
                    if self.session_id.is_none() {
                        let session = SessionId::new(session);
                        self.session_id = Some(session.clone());
                        effects.session_discovered = Some(session);
                        effects
                            .rendered
                            .push(self.renderer.status("codex session started"));
                    }
                }
            }
            Some("item.completed") => self.on_item(&event, &mut effects),
            Some("turn.completed") => {
                if let Some(usage) = event.get("usage") {
                    let tokens_in = usage
                        .get("input_tokens")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0)
                        + usage
                            .get("cached_input_tokens")
                            .and_then(|v| v.as_u64())
                            .unwrap_or(0);
                    self.telemetry.apply(&Telemetry {
                        tokens_in,
                        tokens_out: usage
                            .get("output_tokens")
                            .and_then(|v| v.as_u64())
                            .unwrap_or(0),
                        cached: usage.get("cached_input_tokens").and_then(|v| v.as_u64()),
                        cost: None,
                        duration_ms: None,
                    });
                    effects.telemetry_updated = true;
                }
            }
            Some("error") => {
                let message = event
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown codex error");
                self.error = Some(message.to_string());
                effects.rendered.push(self.renderer.tool_err(message));
            }
            _ => {}
        }
        effects
    }

    fn on_item(&mut self, event: &Value, effects: &mut ParseEffects) {
        let Some(item) = event.get("item") else {
            return;
        };
        match item.get("type").and_then(|t| t.as_str()) {
            Some("agent_message") => {
                if let Some(text) = item.get("text").and_then(|v| v.as_str()) {
                    self.final_text = text.to_string();
                    for line in text.lines() {
                        effects.rendered.push(line.to_string());
                    }
                }
            }
            Some("reasoning") => {
                if let Some(text) = item.get("text").and_then(|v| v.as_str()) {
                    effects
                        .rendered
                        .push(self.renderer.thinking(&brief(text, 120)));
                }
            }
            Some("command_execution") => {
                let command = item.get("command").and_then(|v| v.as_str()).unwrap_or("");
                effects
                    .rendered
                    .push(self.renderer.tool_start("shell", &brief(command, 80)));
                let exit_code = item.get("exit_code").and_then(|v| v.as_i64());
                match exit_code {
                    Some(0) => effects.rendered.push(self.renderer.tool_ok("exit 0")),
                    Some(code) => effects
                        .rendered
                        .push(self.renderer.tool_err(&format!("exit {code}"))),
                    None => {}
                }
            }
            _ => {}
        }
    }
}

/// Codex credentials: API key env var or the CLI's own login state.
pub struct CodexAuth;

impl EngineAuth for CodexAuth {
    fn is_authenticated(&self) -> bool {
        if std::env::var("CODEX_API_KEY").is_ok_and(|v| !v.is_empty())
            || std::env::var("OPENAI_API_KEY").is_ok_and(|v| !v.is_empty())
        {
            return true;
        }
        dirs::home_dir()
            .map(|home| home.join(".codex").join("auth.json").exists())
            .unwrap_or(false)
    }

    fn ensure_auth(&self) -> Result<(), EngineError> {
        if skip_auth() || self.is_authenticated() {
            return Ok(());
        }
        Err(EngineError::Auth(
            "no Codex credentials found. Set CODEX_API_KEY or run `codex login`.".to_string(),
        ))
    }

    fn clear_auth(&self) -> std::io::Result<()> {
        let Some(home) = dirs::home_dir() else {
            return Ok(());
        };
        let path = home.join(".codex").join("auth.json");
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;
