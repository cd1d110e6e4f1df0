// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::render::LineRenderer;

fn stream() -> CodexStream {
    CodexStream::new(LineRenderer::plain())
}

#[test]
fn session_created_discovers_session_once() {
    let mut s = stream();
    let effects = s.parse_line(r#"{"type":"session.created","session_id":"c-1"}"#);
    assert_eq!(effects.session_discovered, Some(SessionId::new("c-1")));
    let again = s.parse_line(r#"{"type":"session.created","session_id":"c-2"}"#);
    assert_eq!(again.session_discovered, None);
}

#[test]
fn agent_message_becomes_final_text() {
    let mut s = stream();
    s.parse_line(r#"{"type":"item.completed","item":{"type":"agent_message","text":"first"}}"#);
    s.parse_line(r#"{"type":"item.completed","item":{"type":"agent_message","text":"second"}}"#);
    assert_eq!(s.final_text, "second");
}

#[test]
fn command_execution_renders_start_and_exit() {
    let mut s = stream();
    let effects = s.parse_line(
        r#"{"type":"item.completed","item":{"type":"command_execution","command":"cargo test","exit_code":0}}"#,
    );
    assert_eq!(effects.rendered, vec!["⏺ shell(cargo test)", "  ⎿ exit 0"]);

    let failed = s.parse_line(
        r#"{"type":"item.completed","item":{"type":"command_execution","command":"false","exit_code":1}}"#,
    );
    assert_eq!(failed.rendered[1], "  ⎿ exit 1");
}

#[test]
fn turn_completed_updates_telemetry_with_cached() {
    let mut s = stream();
    let effects = s.parse_line(
        r#"{"type":"turn.completed","usage":{"input_tokens":200,"cached_input_tokens":50,"output_tokens":40}}"#,
    );
    assert!(effects.telemetry_updated);
    assert_eq!(s.telemetry.tokens_in, 250);
    assert_eq!(s.telemetry.tokens_out, 40);
    assert_eq!(s.telemetry.cached, Some(50));
}

#[test]
fn error_event_is_fatal() {
    let mut s = stream();
    s.parse_line(r#"{"type":"error","message":"model not found"}"#);
    assert_eq!(s.error.as_deref(), Some("model not found"));
}

mod auth {
    use super::*;
    use serial_test::serial;

    // Env vars are process-wide; pin HOME and clear every key first.
    fn isolate_env(dir: &tempfile::TempDir) {
        std::env::set_var("HOME", dir.path());
        std::env::remove_var("CODEMACHINE_SKIP_AUTH");
        std::env::remove_var("CODEX_API_KEY");
        std::env::remove_var("OPENAI_API_KEY");
    }

    #[test]
    #[serial]
    fn missing_credentials_fail_with_a_clear_message() {
        let dir = tempfile::tempdir().unwrap();
        isolate_env(&dir);
        assert!(!CodexAuth.is_authenticated());
        let err = CodexAuth.ensure_auth().unwrap_err();
        assert!(matches!(err, EngineError::Auth(_)));
        assert!(err.to_string().contains("CODEX_API_KEY"));
    }

    fn check_api_key_env(var: &str) {
        let dir = tempfile::tempdir().unwrap();
        isolate_env(&dir);
        std::env::set_var(var, "sk-test-key");
        assert!(CodexAuth.is_authenticated());
        assert!(CodexAuth.ensure_auth().is_ok());
        std::env::remove_var(var);
    }

    #[test]
    #[serial]
    fn codex_api_key_env_authenticates() {
        check_api_key_env("CODEX_API_KEY");
    }

    #[test]
    #[serial]
    fn openai_api_key_env_authenticates() {
        check_api_key_env("OPENAI_API_KEY");
    }

    #[test]
    #[serial]
    fn cli_login_state_authenticates_and_clear_auth_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        isolate_env(&dir);
        let auth_file = dir.path().join(".codex/auth.json");
        std::fs::create_dir_all(auth_file.parent().unwrap()).unwrap();
        std::fs::write(&auth_file, "{}").unwrap();
        assert!(CodexAuth.is_authenticated());

        CodexAuth.clear_auth().unwrap();
        assert!(!auth_file.exists());
        assert!(!CodexAuth.is_authenticated());
    }

    #[test]
    #[serial]
    fn skip_auth_bypasses_the_check() {
        let dir = tempfile::tempdir().unwrap();
        isolate_env(&dir);
        std::env::set_var("CODEMACHINE_SKIP_AUTH", "1");
        assert!(CodexAuth.ensure_auth().is_ok());
        std::env::remove_var("CODEMACHINE_SKIP_AUTH");
    }
}

#[test]
fn resume_builds_exec_resume_invocation() {
    let engine = CodexEngine::new();
    let mut request = RunRequest::new("p", "/tmp/wd");
    request.model = "gpt-5.2-codex".to_string();
    request.resume_session = Some(SessionId::new("c-9"));
    let spec = engine.build_spec(&request);
    let args = spec.args.join(" ");
    assert!(args.starts_with("exec resume c-9"));
    assert!(args.contains("--json"));
}

#[test]
fn reasoning_effort_is_passed_as_config_override() {
    let engine = CodexEngine::new();
    let mut request = RunRequest::new("p", "/tmp/wd");
    request.model = "gpt-5.2-codex".to_string();
    request.reasoning_effort = Some(cm_manifest::ReasoningEffort::High);
    let spec = engine.build_spec(&request);
    assert!(spec
        .args
        .iter()
        .any(|a| a == "model_reasoning_effort=\"high\""));
}
