// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mistral Vibe engine adapter

use super::{
    EngineAdapter, EngineAuth, EngineError, EngineMetadata, EngineOutput, RunCallbacks, RunRequest,
};
use crate::env::skip_auth;
use crate::process::{self, SpawnSpec};
use crate::render::{brief, LineRenderer};
use cm_core::{EngineId, SessionId, Telemetry};
use serde_json::Value;

const SUPPORTED_MODELS: &[&str] = &["devstral-medium", "devstral-small", "mistral-large"];

pub struct MistralEngine {
    metadata: EngineMetadata,
    auth: MistralAuth,
}

impl Default for MistralEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MistralEngine {
    pub fn new() -> Self {
        Self {
            metadata: EngineMetadata {
                id: EngineId::new("mistral"),
                name: "Mistral Vibe",
                binary: "vibe",
                install_hint: "Install it with: npm install -g @mistralai/vibe",
                default_model: "devstral-medium",
                supported_models: SUPPORTED_MODELS,
                default_reasoning_effort: None,
                supports_mcp: false,
            },
            auth: MistralAuth,
        }
    }

    fn build_spec(&self, request: &RunRequest) -> SpawnSpec {
        let mut spec = SpawnSpec::new(self.metadata.binary);
        spec.args = vec![
            "run".to_string(),
            "--format".to_string(),
            "jsonl".to_string(),
            "--model".to_string(),
            request.model.clone(),
        ];
        if let Some(session) = &request.resume_session {
            spec.args.push("--continue".to_string());
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
impl EngineAdapter for MistralEngine {
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
        let mut stream = MistralStream::new(LineRenderer::default());

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

struct MistralStream {
    renderer: LineRenderer,
    session_id: Option<SessionId>,
    telemetry: Telemetry,
    final_text: String,
    error: Option<String>,
}

impl MistralStream {
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

        if event.get("error").is_some() {
            let message = event["error"]
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown mistral error");
            self.error = Some(message.to_string());
            effects.rendered.push(self.renderer.tool_err(message));
            return effects;
        }

        match event.get("event").and_then(|t| t.as_str()) {
            Some("conversation.started") => {
                if let Some(session) = event.get("conversation_id").and_then(|v| v.as_str()) {
                    if self.session_id.is_none() {
                        let session = SessionId::new(session);
                        self.session_id = Some(session.clone());
                        effects.session_discovered = Some(session);
                    }
                }
            }
            Some("message.delta") => {
                if let Some(text) = event.get("text").and_then(|v| v.as_str()) {
                    self.final_text.push_str(text);
                    for line in text.lines() {
                        if !line.is_empty() {
                            effects.rendered.push(line.to_string());
                        }
                    }
                }
            }
            Some("message.completed") => {
                if let Some(text) = event.get("text").and_then(|v| v.as_str()) {
                    self.final_text = text.to_string();
                }
            }
            Some("tool.started") => {
                let name = event.get("tool").and_then(|v| v.as_str()).unwrap_or("tool");
                let args = event.get("input").map(|v| v.to_string()).unwrap_or_default();
                effects
                    .rendered
                    .push(self.renderer.tool_start(name, &brief(&args, 80)));
            }
            Some("tool.completed") => {
                let ok = event.get("ok").and_then(|v| v.as_bool()).unwrap_or(true);
                let detail = event.get("output").and_then(|v| v.as_str()).unwrap_or("");
                let rendered = if ok {
                    self.renderer.tool_ok(&brief(detail, 100))
                } else {
                    self.renderer.tool_err(&brief(detail, 100))
                };
                effects.rendered.push(rendered);
            }
            Some("usage") => {
                self.telemetry.apply(&Telemetry {
                    tokens_in: event
                        .get("prompt_tokens")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0),
                    tokens_out: event
                        .get("completion_tokens")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0),
                    cached: None,
                    cost: None,
                    duration_ms: None,
                });
                effects.telemetry_updated = true;
            }
            _ => {}
        }
        effects
    }
}

pub struct MistralAuth;

impl EngineAuth for MistralAuth {
    fn is_authenticated(&self) -> bool {
        std::env::var("MISTRAL_API_KEY").is_ok_and(|v| !v.is_empty())
    }

    fn ensure_auth(&self) -> Result<(), EngineError> {
        if skip_auth() || self.is_authenticated() {
            return Ok(());
        }
        Err(EngineError::Auth(
            "no Mistral credentials found. Set MISTRAL_API_KEY.".to_string(),
        ))
    }

    fn clear_auth(&self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "mistral_tests.rs"]
mod tests;
