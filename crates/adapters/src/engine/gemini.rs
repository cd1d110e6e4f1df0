// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gemini CLI engine adapter

use super::{
    EngineAdapter, EngineAuth, EngineError, EngineMetadata, EngineOutput, RunCallbacks, RunRequest,
};
use crate::env::skip_auth;
use crate::process::{self, SpawnSpec};
use crate::render::{brief, LineRenderer};
use cm_core::{EngineId, SessionId, Telemetry};
use serde_json::Value;

const SUPPORTED_MODELS: &[&str] = &["gemini-3-pro", "gemini-3-flash", "gemini-2.5-pro"];

pub struct GeminiEngine {
    metadata: EngineMetadata,
    auth: GeminiAuth,
}

impl Default for GeminiEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiEngine {
    pub fn new() -> Self {
        Self {
            metadata: EngineMetadata {
                id: EngineId::new("gemini"),
                name: "Gemini CLI",
                binary: "gemini",
                install_hint: "Install it with: npm install -g @google/gemini-cli",
                default_model: "gemini-3-pro",
                supported_models: SUPPORTED_MODELS,
                default_reasoning_effort: None,
                supports_mcp: false,
            },
            auth: GeminiAuth,
        }
    }

    fn build_spec(&self, request: &RunRequest) -> SpawnSpec {
        let mut spec = SpawnSpec::new(self.metadata.binary);
        spec.args = vec![
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--yolo".to_string(),
            "-m".to_string(),
            request.model.clone(),
        ];
        if let Some(session) = &request.resume_session {
            spec.args.push("--resume".to_string());
            spec.args.push(session.to_string());
        }
        spec.stdin = Some(request.prompt.clone());
        spec.cwd = Some(request.working_dir.clone());
        spec.timeout = request.timeout;
        spec.install_hint = Some(self.metadata.install_hint.to_string());
        spec
    }
}

#[async_trait::async_trait]
impl EngineAdapter for GeminiEngine {
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
        let mut stream = GeminiStream::new(LineRenderer::default());

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

struct GeminiStream {
    renderer: LineRenderer,
    session_id: Option<SessionId>,
    telemetry: Telemetry,
    final_text: String,
    error: Option<String>,
}

impl GeminiStream {
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
            Some("init") => {
                if let Some(session) = event.get("session_id").and_then(|v| v.as_str()) {
                    if self.session_id.is_none() {
                        let session = SessionId::new(session);
                        self.session_id = Some(session.clone());
                        effects.session_discovered = Some(session);
                    }
                }
            }
            Some("message") => {
                if let Some(text) = event.get("content").and_then(|v| v.as_str()) {
                    self.final_text = text.to_string();
                    for line in text.lines() {
                        effects.rendered.push(line.to_string());
                    }
                }
            }
            Some("tool_call") => {
                let name = event.get("name").and_then(|v| v.as_str()).unwrap_or("tool");
                let args = event
                    .get("args")
                    .map(|a| a.to_string())
                    .unwrap_or_default();
                effects
                    .rendered
                    .push(self.renderer.tool_start(name, &brief(&args, 80)));
            }
            Some("tool_result") => {
                let ok = event.get("status").and_then(|v| v.as_str()) != Some("error");
                let detail = event
                    .get("output")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let rendered = if ok {
                    self.renderer.tool_ok(&brief(detail, 100))
                } else {
                    self.renderer.tool_err(&brief(detail, 100))
                };
                effects.rendered.push(rendered);
            }
            Some("stats") => {
                if let Some(usage) = event.get("usage") {
                    self.telemetry.apply(&Telemetry {
                        tokens_in: usage
                            .get("prompt_tokens")
                            .and_then(|v| v.as_u64())
                            .unwrap_or(0),
                        tokens_out: usage
                            .get("completion_tokens")
                            .and_then(|v| v.as_u64())
                            .unwrap_or(0),
                        cached: usage.get("cached_tokens").and_then(|v| v.as_u64()),
                        cost: None,
                        duration_ms: event.get("duration_ms").and_then(|v| v.as_u64()),
                    });
                    effects.telemetry_updated = true;
                }
            }
            Some("error") => {
                let message = event
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown gemini error");
                self.error = Some(message.to_string());
                effects.rendered.push(self.renderer.tool_err(message));
            }
            _ => {}
        }
        effects
    }
}

pub struct GeminiAuth;

impl EngineAuth for GeminiAuth {
    fn is_authenticated(&self) -> bool {
        if std::env::var("GEMINI_API_KEY").is_ok_and(|v| !v.is_empty()) {
            return true;
        }
        dirs::home_dir()
            .map(|home| home.join(".gemini").join("oauth_creds.json").exists())
            .unwrap_or(false)
    }

    fn ensure_auth(&self) -> Result<(), EngineError> {
        if skip_auth() || self.is_authenticated() {
            return Ok(());
        }
        Err(EngineError::Auth(
            "no Gemini credentials found. Set GEMINI_API_KEY or run `gemini` once to log in."
                .to_string(),
        ))
    }

    fn clear_auth(&self) -> std::io::Result<()> {
        let Some(home) = dirs::home_dir() else {
            return Ok(());
        };
        let path = home.join(".gemini").join("oauth_creds.json");
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "gemini_tests.rs"]
mod tests;
