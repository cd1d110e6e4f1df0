// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude Code engine adapter
//!
//! Drives `claude -p --output-format stream-json` and parses its record
//! stream: one JSON object per line with `system`, `assistant`, `user`, and
//! `result` records.

use super::{
    EngineAdapter, EngineAuth, EngineError, EngineMetadata, EngineOutput, McpIntegration,
    RunCallbacks, RunRequest,
};
use crate::env::{codemachine_home, skip_auth};
use crate::process::{self, SpawnSpec};
use crate::render::{brief, LineRenderer};
use cm_core::{EngineId, SessionId, Telemetry};
use serde_json::Value;
use std::path::{Path, PathBuf};

const SUPPORTED_MODELS: &[&str] = &[
    "claude-opus-4-5",
    "claude-sonnet-4-5",
    "claude-sonnet-4",
    "claude-haiku-4-5",
];

/// Adapter for the Claude Code CLI.
pub struct ClaudeEngine {
    metadata: EngineMetadata,
    mcp: ClaudeMcp,
    auth: ClaudeAuth,
}

impl Default for ClaudeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaudeEngine {
    pub fn new() -> Self {
        Self {
            metadata: EngineMetadata {
                id: EngineId::new("claude"),
                name: "Claude Code",
                binary: "claude",
                install_hint: "Install it with: npm install -g @anthropic-ai/claude-code",
                default_model: "claude-sonnet-4-5",
                supported_models: SUPPORTED_MODELS,
                default_reasoning_effort: None,
                supports_mcp: true,
            },
            mcp: ClaudeMcp,
            auth: ClaudeAuth,
        }
    }

    fn build_spec(&self, request: &RunRequest) -> SpawnSpec {
        let mut spec = SpawnSpec::new(self.metadata.binary);
        spec.args = vec![
            "-p".to_string(),
            "--verbose".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--model".to_string(),
            request.model.clone(),
            "--dangerously-skip-permissions".to_string(),
        ];
        if let Some(session) = &request.resume_session {
            spec.args.push("--resume".to_string());
            spec.args.push(session.to_string());
        }
        // The prompt goes through stdin so arbitrary content never hits argv.
        spec.stdin = Some(request.prompt.clone());
        spec.cwd = Some(request.working_dir.clone());
        spec.env.push((
            "CLAUDE_CONFIG_DIR".to_string(),
            codemachine_home().join("claude").display().to_string(),
        ));
        spec.timeout = request.timeout;
        spec.install_hint = Some(self.metadata.install_hint.to_string());
        spec
    }
}

#[async_trait::async_trait]
impl EngineAdapter for ClaudeEngine {
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
        let mut stream = ClaudeStream::new(LineRenderer::default());

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

    fn mcp(&self) -> Option<&dyn McpIntegration> {
        Some(&self.mcp)
    }

    fn auth(&self) -> Option<&dyn EngineAuth> {
        Some(&self.auth)
    }
}

/// Effects of parsing one stream line.
#[derive(Debug, Default)]
struct ParseEffects {
    rendered: Vec<String>,
    telemetry_updated: bool,
    session_discovered: Option<SessionId>,
}

/// Incremental parser over the stream-json record format.
///
/// Resilient to partial or malformed records: anything that fails to parse
/// is passed through as a raw line.
struct ClaudeStream {
    renderer: LineRenderer,
    session_id: Option<SessionId>,
    telemetry: Telemetry,
    /// Running totals across assistant turns; the final `result` record
    /// overwrites them with authoritative numbers.
    turn_tokens_in: u64,
    turn_tokens_out: u64,
    final_text: String,
    error: Option<String>,
}

impl ClaudeStream {
    fn new(renderer: LineRenderer) -> Self {
        Self {
            renderer,
            session_id: None,
            telemetry: Telemetry::default(),
            turn_tokens_in: 0,
            turn_tokens_out: 0,
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
        let Ok(record) = serde_json::from_str::<Value>(trimmed) else {
            // Parse errors are non-fatal: emit the raw line and keep going.
            effects.rendered.push(line.to_string());
            return effects;
        };

        self.scan_for_error(&record);

        match record.get("type").and_then(|t| t.as_str()) {
            Some("system") => self.on_system(&record, &mut effects),
            Some("assistant") => self.on_assistant(&record, &mut effects),
            Some("user") => self.on_user(&record, &mut effects),
            Some("result") => self.on_result(&record, &mut effects),
            _ => {}
        }
        effects
    }

    /// Engines can exit 0 while still reporting an error (rate limits,
    /// invalid model); catch `is_error` / `error` fields on any record.
    fn scan_for_error(&mut self, record: &Value) {
        if record.get("is_error").and_then(|v| v.as_bool()) == Some(true) {
            let detail = record
                .get("result")
                .or_else(|| record.get("error"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown engine error");
            self.error = Some(detail.to_string());
        } else if let Some(error) = record.get("error") {
            let detail = error
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown engine error");
            self.error = Some(detail.to_string());
        }
    }

    fn on_system(&mut self, record: &Value, effects: &mut ParseEffects) {
        if record.get("subtype").and_then(|v| v.as_str()) != Some("init") {
            return;
        }
        if let Some(session) = record.get("session_id").and_then(|v| v.as_str()) {
            if self.session_id.is_none() {
                let session = SessionId::new(session);
                self.session_id = Some(session.clone());
                effects.session_discovered = Some(session);
            }
        }
        let model = record
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown model");
        effects
            .rendered
            .push(self.renderer.status(&format!("session started ({model})")));
    }

    fn on_assistant(&mut self, record: &Value, effects: &mut ParseEffects) {
        let Some(message) = record.get("message") else {
            return;
        };
        if let Some(blocks) = message.get("content").and_then(|v| v.as_array()) {
            for block in blocks {
                match block.get("type").and_then(|v| v.as_str()) {
                    Some("text") => {
                        if let Some(text) = block.get("text").and_then(|v| v.as_str()) {
                            self.final_text = text.to_string();
                            for line in text.lines() {
                                effects.rendered.push(line.to_string());
                            }
                        }
                    }
                    Some("thinking") => {
                        if let Some(text) = block.get("thinking").and_then(|v| v.as_str()) {
                            effects
                                .rendered
                                .push(self.renderer.thinking(&brief(text, 120)));
                        }
                    }
                    Some("tool_use") => {
                        let name = block
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or("tool");
                        let input = block
                            .get("input")
                            .map(summarize_tool_input)
                            .unwrap_or_default();
                        effects
                            .rendered
                            .push(self.renderer.tool_start(name, &brief(&input, 80)));
                    }
                    _ => {}
                }
            }
        }
        if let Some(usage) = message.get("usage") {
            self.turn_tokens_in += tokens_in_from_usage(usage);
            self.turn_tokens_out += usage
                .get("output_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            self.telemetry.apply(&Telemetry {
                tokens_in: self.turn_tokens_in,
                tokens_out: self.turn_tokens_out,
                cached: self.telemetry.cached,
                cost: None,
                duration_ms: None,
            });
            effects.telemetry_updated = true;
        }
    }

    fn on_user(&mut self, record: &Value, effects: &mut ParseEffects) {
        let Some(blocks) = record
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_array())
        else {
            return;
        };
        for block in blocks {
            if block.get("type").and_then(|v| v.as_str()) != Some("tool_result") {
                continue;
            }
            let detail = tool_result_text(block);
            let is_error = block.get("is_error").and_then(|v| v.as_bool()) == Some(true);
            let rendered = if is_error {
                self.renderer.tool_err(&brief(&detail, 100))
            } else {
                self.renderer.tool_ok(&brief(&detail, 100))
            };
            effects.rendered.push(rendered);
        }
    }

    fn on_result(&mut self, record: &Value, effects: &mut ParseEffects) {
        if let Some(text) = record.get("result").and_then(|v| v.as_str()) {
            if self.error.is_none() {
                self.final_text = text.to_string();
            }
        }
        if let Some(session) = record.get("session_id").and_then(|v| v.as_str()) {
            if self.session_id.is_none() {
                let session = SessionId::new(session);
                self.session_id = Some(session.clone());
                effects.session_discovered = Some(session);
            }
        }
        let mut update = Telemetry {
            tokens_in: self.turn_tokens_in,
            tokens_out: self.turn_tokens_out,
            ..Default::default()
        };
        if let Some(usage) = record.get("usage") {
            update.tokens_in = tokens_in_from_usage(usage);
            update.tokens_out = usage
                .get("output_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            update.cached = usage.get("cache_read_input_tokens").and_then(|v| v.as_u64());
        }
        update.cost = record.get("total_cost_usd").and_then(|v| v.as_f64());
        update.duration_ms = record.get("duration_ms").and_then(|v| v.as_u64());
        self.telemetry.apply(&update);
        effects.telemetry_updated = true;

        let cost = update
            .cost
            .map(|c| format!(" · ${c:.4}"))
            .unwrap_or_default();
        effects.rendered.push(self.renderer.summary(&format!(
            "{} in · {} out{}",
            update.tokens_in, update.tokens_out, cost
        )));
    }
}

/// `input_tokens` plus both cache counters; `tokens_in` includes cached.
fn tokens_in_from_usage(usage: &Value) -> u64 {
    ["input_tokens", "cache_read_input_tokens", "cache_creation_input_tokens"]
        .iter()
        .map(|key| usage.get(key).and_then(|v| v.as_u64()).unwrap_or(0))
        .sum()
}

/// Pick the most interesting field of a tool input for the one-line render.
fn summarize_tool_input(input: &Value) -> String {
    for key in ["file_path", "path", "command", "pattern", "url", "query"] {
        if let Some(value) = input.get(key).and_then(|v| v.as_str()) {
            return value.to_string();
        }
    }
    String::new()
}

fn tool_result_text(block: &Value) -> String {
    match block.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

/// Claude credentials: env vars first, then the config-dir credential file.
pub struct ClaudeAuth;

impl ClaudeAuth {
    fn credentials_path() -> PathBuf {
        codemachine_home().join("claude").join(".credentials.json")
    }
}

impl EngineAuth for ClaudeAuth {
    fn is_authenticated(&self) -> bool {
        if std::env::var("ANTHROPIC_API_KEY").is_ok_and(|v| !v.is_empty())
            || std::env::var("ANTHROPIC_AUTH_TOKEN").is_ok_and(|v| !v.is_empty())
        {
            return true;
        }
        if Self::credentials_path().exists() {
            return true;
        }
        // A user-level claude login also counts.
        dirs::home_dir()
            .map(|home| home.join(".claude").join(".credentials.json").exists())
            .unwrap_or(false)
    }

    fn ensure_auth(&self) -> Result<(), EngineError> {
        if skip_auth() || self.is_authenticated() {
            return Ok(());
        }
        Err(EngineError::Auth(
            "no Claude credentials found. Set ANTHROPIC_API_KEY or run `claude` once to log in."
                .to_string(),
        ))
    }

    fn clear_auth(&self) -> std::io::Result<()> {
        let path = Self::credentials_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Mirrors the workspace's configured MCP backends into the per-workspace
/// `.mcp.json` Claude reads, under `codemachine-` prefixed names so cleanup
/// never touches entries the user added themselves.
pub struct ClaudeMcp;

const MCP_KEY_PREFIX: &str = "codemachine-";

impl ClaudeMcp {
    /// Backend definitions live in `.codemachine/mcp.json`:
    /// `{ "<id>": { "command": ..., "args": [...], "env": {...} } }`.
    fn backend_configs(workflow_dir: &Path) -> Option<serde_json::Map<String, Value>> {
        let content =
            std::fs::read_to_string(workflow_dir.join(".codemachine").join("mcp.json")).ok()?;
        serde_json::from_str::<Value>(&content)
            .ok()?
            .as_object()
            .cloned()
    }
}

impl McpIntegration for ClaudeMcp {
    fn supported(&self) -> bool {
        true
    }

    fn configure(&self, workflow_dir: &Path) -> std::io::Result<()> {
        let Some(backends) = Self::backend_configs(workflow_dir) else {
            // No backends declared; nothing to install.
            return Ok(());
        };
        let path = workflow_dir.join(".mcp.json");
        // Merge with any existing client config rather than clobbering it.
        let mut root: Value = match std::fs::read_to_string(&path) {
            Ok(content) => {
                serde_json::from_str(&content).unwrap_or_else(|_| Value::Object(Default::default()))
            }
            Err(_) => Value::Object(Default::default()),
        };
        let servers = root.as_object_mut().and_then(|o| {
            o.entry("mcpServers")
                .or_insert_with(|| Value::Object(Default::default()))
                .as_object_mut()
        });
        if let Some(servers) = servers {
            for (id, config) in backends {
                servers.insert(format!("{MCP_KEY_PREFIX}{id}"), config);
            }
        }
        std::fs::write(&path, serde_json::to_string_pretty(&root)?)
    }

    fn cleanup(&self, workflow_dir: &Path) -> std::io::Result<()> {
        let path = workflow_dir.join(".mcp.json");
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Ok(());
        };
        let Ok(mut root) = serde_json::from_str::<Value>(&content) else {
            return Ok(());
        };
        let mut empty = false;
        if let Some(servers) = root.get_mut("mcpServers").and_then(|v| v.as_object_mut()) {
            servers.retain(|key, _| !key.starts_with(MCP_KEY_PREFIX));
            empty = servers.is_empty();
        }
        if empty {
            std::fs::remove_file(&path)
        } else {
            std::fs::write(&path, serde_json::to_string_pretty(&root)?)
        }
    }

    fn is_configured(&self, workflow_dir: &Path) -> bool {
        std::fs::read_to_string(workflow_dir.join(".mcp.json"))
            .ok()
            .and_then(|content| serde_json::from_str::<Value>(&content).ok())
            .and_then(|root| {
                root.get("mcpServers").and_then(|servers| {
                    servers
                        .as_object()
                        .map(|map| map.keys().any(|key| key.starts_with(MCP_KEY_PREFIX)))
                })
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
