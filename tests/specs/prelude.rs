//! Test helpers for behavioral specifications.
//!
//! Provides a small DSL for driving the codemachine binary inside an
//! isolated temp workspace, with a stubbed `claude` engine on PATH.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Two plain steps, no controller, no directives.
pub const MINIMAL_MANIFEST: &str = r#"
[agents.planner]
prompt_path = "prompts/plan.md"

[agents.coder]
prompt_path = "prompts/code.md"

[[workflows.default.steps]]
agent = "planner"

[[workflows.default.steps]]
agent = "coder"
"#;

/// Stub `claude` that replays a clean stream-json transcript.
pub const CLAUDE_STUB_OK: &str = r#"#!/bin/sh
cat >/dev/null
echo '{"type":"system","subtype":"init","session_id":"stub-session","model":"stub-model"}'
echo '{"type":"assistant","message":{"content":[{"type":"text","text":"stub reply"}]}}'
echo '{"type":"result","subtype":"success","result":"stub reply","usage":{"input_tokens":12,"output_tokens":3},"total_cost_usd":0.0012,"duration_ms":7,"session_id":"stub-session"}'
"#;

/// Stub `claude` whose final text carries a trailing stop directive.
pub const CLAUDE_STUB_STOP: &str = r#"#!/bin/sh
cat >/dev/null
echo '{"type":"system","subtype":"init","session_id":"stub-session","model":"stub-model"}'
echo '{"type":"result","subtype":"success","result":"done\n```json\n{\"action\":\"stop\",\"reason\":\"all done\"}\n```","usage":{"input_tokens":5,"output_tokens":2},"session_id":"stub-session"}'
"#;

/// Returns the path to a workspace binary.
///
/// Resolves `target/debug/<name>` via CARGO_MANIFEST_DIR, falling back to
/// the test executable's grandparent when the manifest dir is stale
/// (shared target directories).
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }
    standard
}

/// One isolated workspace for a spec.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("bin")).unwrap();
        Self { dir }
    }

    /// Workspace with the minimal two-step manifest and its prompt files.
    pub fn with_manifest() -> Self {
        let project = Self::empty();
        project.file(".codemachine/workflow.toml", MINIMAL_MANIFEST);
        project.file("prompts/plan.md", "plan the work");
        project.file("prompts/code.md", "write the code");
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.dir.path().join("bin")
    }

    /// Write a file under the workspace, creating parent dirs.
    pub fn file(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(rel)).unwrap()
    }

    /// Install an executable stub named `claude` on the project PATH.
    #[cfg(unix)]
    pub fn stub_claude(&self, script: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = self.bin_dir().join("claude");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// The parsed `.codemachine/template.json`.
    pub fn tracking(&self) -> serde_json::Value {
        serde_json::from_str(&self.read(".codemachine/template.json")).unwrap()
    }

    /// A codemachine invocation rooted in this workspace, hermetic: HOME
    /// and CODEMACHINE_HOME point into the temp dir, auth is skipped, and
    /// the project `bin/` dir shadows the system PATH.
    pub fn codemachine(&self) -> Command {
        let mut cmd = Command::from_std(std::process::Command::new(binary_path("codemachine")));
        cmd.current_dir(self.dir.path())
            .timeout(std::time::Duration::from_secs(30))
            .env("HOME", self.dir.path())
            .env("CODEMACHINE_HOME", self.dir.path().join(".cm-home"))
            .env("CODEMACHINE_SKIP_AUTH", "1")
            .env("NO_COLOR", "1")
            .env(
                "PATH",
                format!(
                    "{}:{}",
                    self.bin_dir().display(),
                    std::env::var("PATH").unwrap_or_default()
                ),
            );
        cmd
    }
}
