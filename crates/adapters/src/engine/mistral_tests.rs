// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::render::LineRenderer;

#[test]
fn deltas_accumulate_until_completed_overwrites() {
    let mut s = MistralStream::new(LineRenderer::plain());
    s.parse_line(r#"{"event":"message.delta","text":"par"}"#);
    s.parse_line(r#"{"event":"message.delta","text":"tial"}"#);
    assert_eq!(s.final_text, "partial");
    s.parse_line(r#"{"event":"message.completed","text":"final answer"}"#);
    assert_eq!(s.final_text, "final answer");
}

#[test]
fn conversation_started_discovers_session() {
    let mut s = MistralStream::new(LineRenderer::plain());
    let effects = s.parse_line(r#"{"event":"conversation.started","conversation_id":"m-1"}"#);
    assert_eq!(effects.session_discovered, Some(SessionId::new("m-1")));
}

#[test]
fn usage_event_updates_telemetry() {
    let mut s = MistralStream::new(LineRenderer::plain());
    s.parse_line(r#"{"event":"usage","prompt_tokens":80,"completion_tokens":16}"#);
    assert_eq!(s.telemetry.tokens_in, 80);
    assert_eq!(s.telemetry.tokens_out, 16);
}

#[test]
fn error_object_is_fatal() {
    let mut s = MistralStream::new(LineRenderer::plain());
    s.parse_line(r#"{"error":{"message":"invalid api key"}}"#);
    assert_eq!(s.error.as_deref(), Some("invalid api key"));
}

#[test]
fn tool_events_render_markers() {
    let mut s = MistralStream::new(LineRenderer::plain());
    let start = s.parse_line(r#"{"event":"tool.started","tool":"read_file","input":{"path":"a"}}"#);
    assert!(start.rendered[0].starts_with("⏺ read_file"));
    let done = s.parse_line(r#"{"event":"tool.completed","ok":false,"output":"denied"}"#);
    assert_eq!(done.rendered, vec!["  ⎿ denied"]);
}

mod auth {
    use super::*;
    use serial_test::serial;

    // MISTRAL_API_KEY is process-wide; clear it before every check.
    fn isolate_env() {
        std::env::remove_var("CODEMACHINE_SKIP_AUTH");
        std::env::remove_var("MISTRAL_API_KEY");
    }

    #[test]
    #[serial]
    fn missing_credentials_fail_with_a_clear_message() {
        isolate_env();
        assert!(!MistralAuth.is_authenticated());
        let err = MistralAuth.ensure_auth().unwrap_err();
        assert!(matches!(err, EngineError::Auth(_)));
        assert!(err.to_string().contains("MISTRAL_API_KEY"));
    }

    #[test]
    #[serial]
    fn api_key_env_authenticates() {
        isolate_env();
        std::env::set_var("MISTRAL_API_KEY", "test-key");
        assert!(MistralAuth.is_authenticated());
        assert!(MistralAuth.ensure_auth().is_ok());
        std::env::remove_var("MISTRAL_API_KEY");
    }

    #[test]
    #[serial]
    fn empty_api_key_does_not_authenticate() {
        isolate_env();
        std::env::set_var("MISTRAL_API_KEY", "");
        assert!(!MistralAuth.is_authenticated());
        std::env::remove_var("MISTRAL_API_KEY");
    }

    #[test]
    #[serial]
    fn skip_auth_bypasses_the_check() {
        isolate_env();
        std::env::set_var("CODEMACHINE_SKIP_AUTH", "1");
        assert!(MistralAuth.ensure_auth().is_ok());
        std::env::remove_var("CODEMACHINE_SKIP_AUTH");
    }

    #[test]
    #[serial]
    fn clear_auth_is_a_noop_for_env_only_credentials() {
        isolate_env();
        assert!(MistralAuth.clear_auth().is_ok());
    }
}
