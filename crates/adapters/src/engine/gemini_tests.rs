// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::render::LineRenderer;

#[test]
fn stats_event_updates_telemetry() {
    let mut s = GeminiStream::new(LineRenderer::plain());
    let effects = s.parse_line(
        r#"{"type":"stats","usage":{"prompt_tokens":120,"completion_tokens":44,"cached_tokens":12},"duration_ms":900}"#,
    );
    assert!(effects.telemetry_updated);
    assert_eq!(s.telemetry.tokens_in, 120);
    assert_eq!(s.telemetry.tokens_out, 44);
    assert_eq!(s.telemetry.cached, Some(12));
    assert_eq!(s.telemetry.duration_ms, Some(900));
}

#[test]
fn message_content_is_final_text() {
    let mut s = GeminiStream::new(LineRenderer::plain());
    s.parse_line(r#"{"type":"message","role":"assistant","content":"all done"}"#);
    assert_eq!(s.final_text, "all done");
}

#[test]
fn tool_result_error_status_renders_err_marker() {
    let mut s = GeminiStream::new(LineRenderer::plain());
    let effects =
        s.parse_line(r#"{"type":"tool_result","status":"error","output":"denied"}"#);
    assert_eq!(effects.rendered, vec!["  ⎿ denied"]);
}

#[test]
fn init_event_discovers_session() {
    let mut s = GeminiStream::new(LineRenderer::plain());
    let effects = s.parse_line(r#"{"type":"init","session_id":"g-1"}"#);
    assert_eq!(effects.session_discovered, Some(SessionId::new("g-1")));
}

#[test]
fn error_event_is_fatal() {
    let mut s = GeminiStream::new(LineRenderer::plain());
    s.parse_line(r#"{"type":"error","message":"quota exceeded"}"#);
    assert_eq!(s.error.as_deref(), Some("quota exceeded"));
}

mod auth {
    use super::*;
    use serial_test::serial;

    // Env vars are process-wide; pin HOME and clear the key first.
    fn isolate_env(dir: &tempfile::TempDir) {
        std::env::set_var("HOME", dir.path());
        std::env::remove_var("CODEMACHINE_SKIP_AUTH");
        std::env::remove_var("GEMINI_API_KEY");
    }

    #[test]
    #[serial]
    fn missing_credentials_fail_with_a_clear_message() {
        let dir = tempfile::tempdir().unwrap();
        isolate_env(&dir);
        assert!(!GeminiAuth.is_authenticated());
        let err = GeminiAuth.ensure_auth().unwrap_err();
        assert!(matches!(err, EngineError::Auth(_)));
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    #[serial]
    fn api_key_env_authenticates() {
        let dir = tempfile::tempdir().unwrap();
        isolate_env(&dir);
        std::env::set_var("GEMINI_API_KEY", "test-key");
        assert!(GeminiAuth.is_authenticated());
        assert!(GeminiAuth.ensure_auth().is_ok());
        std::env::remove_var("GEMINI_API_KEY");
    }

    #[test]
    #[serial]
    fn oauth_creds_authenticate_and_clear_auth_removes_them() {
        let dir = tempfile::tempdir().unwrap();
        isolate_env(&dir);
        let creds = dir.path().join(".gemini/oauth_creds.json");
        std::fs::create_dir_all(creds.parent().unwrap()).unwrap();
        std::fs::write(&creds, "{}").unwrap();
        assert!(GeminiAuth.is_authenticated());

        GeminiAuth.clear_auth().unwrap();
        assert!(!creds.exists());
        assert!(!GeminiAuth.is_authenticated());
    }

    #[test]
    #[serial]
    fn skip_auth_bypasses_the_check() {
        let dir = tempfile::tempdir().unwrap();
        isolate_env(&dir);
        std::env::set_var("CODEMACHINE_SKIP_AUTH", "1");
        assert!(GeminiAuth.ensure_auth().is_ok());
        std::env::remove_var("CODEMACHINE_SKIP_AUTH");
    }
}
