// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::render::LineRenderer;

fn stream() -> ClaudeStream {
    ClaudeStream::new(LineRenderer::plain())
}

#[test]
fn init_record_yields_session_id_once() {
    let mut s = stream();
    let effects = s.parse_line(
        r#"{"type":"system","subtype":"init","session_id":"sess-1","model":"claude-sonnet-4-5"}"#,
    );
    assert_eq!(effects.session_discovered, Some(SessionId::new("sess-1")));
    assert!(effects.rendered[0].contains("claude-sonnet-4-5"));

    // second init does not re-discover
    let effects = s.parse_line(
        r#"{"type":"system","subtype":"init","session_id":"sess-2","model":"m"}"#,
    );
    assert_eq!(effects.session_discovered, None);
    assert_eq!(s.session_id, Some(SessionId::new("sess-1")));
}

#[test]
fn assistant_text_renders_and_becomes_final_text() {
    let mut s = stream();
    let effects = s.parse_line(
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hello\nworld"}]}}"#,
    );
    assert_eq!(effects.rendered, vec!["hello", "world"]);
    assert_eq!(s.final_text, "hello\nworld");
}

#[test]
fn tool_use_renders_marker_with_input_summary() {
    let mut s = stream();
    let effects = s.parse_line(
        r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Read","input":{"file_path":"src/main.rs"}}]}}"#,
    );
    assert_eq!(effects.rendered, vec!["⏺ Read(src/main.rs)"]);
}

#[test]
fn tool_result_renders_ok_and_error_markers() {
    let mut s = stream();
    let ok = s.parse_line(
        r#"{"type":"user","message":{"content":[{"type":"tool_result","content":"42 lines"}]}}"#,
    );
    assert_eq!(ok.rendered, vec!["  ⎿ 42 lines"]);

    let err = s.parse_line(
        r#"{"type":"user","message":{"content":[{"type":"tool_result","is_error":true,"content":"no such file"}]}}"#,
    );
    assert_eq!(err.rendered, vec!["  ⎿ no such file"]);
}

#[test]
fn result_record_sets_authoritative_telemetry() {
    let mut s = stream();
    s.parse_line(
        r#"{"type":"assistant","message":{"content":[],"usage":{"input_tokens":10,"output_tokens":5}}}"#,
    );
    let effects = s.parse_line(
        r#"{"type":"result","subtype":"success","result":"done","usage":{"input_tokens":100,"cache_read_input_tokens":40,"output_tokens":30},"total_cost_usd":0.0421,"duration_ms":6100,"session_id":"sess-9"}"#,
    );
    assert!(effects.telemetry_updated);
    assert_eq!(s.telemetry.tokens_in, 140);
    assert_eq!(s.telemetry.tokens_out, 30);
    assert_eq!(s.telemetry.cached, Some(40));
    assert_eq!(s.telemetry.cost, Some(0.0421));
    assert_eq!(s.telemetry.duration_ms, Some(6100));
    assert_eq!(s.final_text, "done");
    assert!(s.error.is_none());
}

#[test]
fn is_error_result_is_captured_as_stream_error() {
    let mut s = stream();
    s.parse_line(
        r#"{"type":"result","subtype":"error_during_execution","is_error":true,"result":"rate limited"}"#,
    );
    assert_eq!(s.error.as_deref(), Some("rate limited"));
    // final text must not be replaced by the error payload
    assert_eq!(s.final_text, "");
}

#[test]
fn error_object_is_captured() {
    let mut s = stream();
    s.parse_line(r#"{"type":"system","error":{"message":"invalid model"}}"#);
    assert_eq!(s.error.as_deref(), Some("invalid model"));
}

#[test]
fn unparseable_lines_pass_through_raw() {
    let mut s = stream();
    let effects = s.parse_line("not json at all");
    assert_eq!(effects.rendered, vec!["not json at all"]);
}

#[test]
fn per_turn_usage_accumulates_until_result() {
    let mut s = stream();
    s.parse_line(
        r#"{"type":"assistant","message":{"content":[],"usage":{"input_tokens":10,"output_tokens":2}}}"#,
    );
    s.parse_line(
        r#"{"type":"assistant","message":{"content":[],"usage":{"input_tokens":20,"output_tokens":3}}}"#,
    );
    assert_eq!(s.telemetry.tokens_in, 30);
    assert_eq!(s.telemetry.tokens_out, 5);
}

mod auth {
    use super::*;
    use serial_test::serial;

    // Auth checks read HOME / CODEMACHINE_HOME and the Anthropic env vars,
    // which are process-wide; every test here pins them to a temp dir.
    fn isolate_env(dir: &tempfile::TempDir) {
        std::env::set_var("HOME", dir.path());
        std::env::set_var("CODEMACHINE_HOME", dir.path().join(".codemachine"));
        std::env::remove_var("CODEMACHINE_SKIP_AUTH");
        std::env::remove_var("ANTHROPIC_API_KEY");
        std::env::remove_var("ANTHROPIC_AUTH_TOKEN");
    }

    #[test]
    #[serial]
    fn missing_credentials_fail_with_a_clear_message() {
        let dir = tempfile::tempdir().unwrap();
        isolate_env(&dir);
        assert!(!ClaudeAuth.is_authenticated());
        let err = ClaudeAuth.ensure_auth().unwrap_err();
        assert!(matches!(err, EngineError::Auth(_)));
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    #[serial]
    fn api_key_env_authenticates() {
        let dir = tempfile::tempdir().unwrap();
        isolate_env(&dir);
        std::env::set_var("ANTHROPIC_API_KEY", "sk-test-key");
        assert!(ClaudeAuth.is_authenticated());
        assert!(ClaudeAuth.ensure_auth().is_ok());
        std::env::remove_var("ANTHROPIC_API_KEY");
    }

    #[test]
    #[serial]
    fn auth_token_env_authenticates() {
        let dir = tempfile::tempdir().unwrap();
        isolate_env(&dir);
        std::env::set_var("ANTHROPIC_AUTH_TOKEN", "token-test");
        assert!(ClaudeAuth.is_authenticated());
        std::env::remove_var("ANTHROPIC_AUTH_TOKEN");
    }

    #[test]
    #[serial]
    fn credentials_file_authenticates_and_clear_auth_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        isolate_env(&dir);
        let creds = dir.path().join(".codemachine/claude/.credentials.json");
        std::fs::create_dir_all(creds.parent().unwrap()).unwrap();
        std::fs::write(&creds, "{}").unwrap();
        assert!(ClaudeAuth.is_authenticated());

        ClaudeAuth.clear_auth().unwrap();
        assert!(!creds.exists());
        assert!(!ClaudeAuth.is_authenticated());
    }

    #[test]
    #[serial]
    fn user_level_login_counts_too() {
        let dir = tempfile::tempdir().unwrap();
        isolate_env(&dir);
        let creds = dir.path().join(".claude/.credentials.json");
        std::fs::create_dir_all(creds.parent().unwrap()).unwrap();
        std::fs::write(&creds, "{}").unwrap();
        assert!(ClaudeAuth.is_authenticated());
    }

    #[test]
    #[serial]
    fn skip_auth_bypasses_the_check() {
        let dir = tempfile::tempdir().unwrap();
        isolate_env(&dir);
        std::env::set_var("CODEMACHINE_SKIP_AUTH", "1");
        assert!(!ClaudeAuth.is_authenticated());
        assert!(ClaudeAuth.ensure_auth().is_ok());
        std::env::remove_var("CODEMACHINE_SKIP_AUTH");
    }
}

mod spec_building {
    use super::*;
    use crate::process::StdioMode;

    #[test]
    fn prompt_goes_to_stdin_not_argv() {
        let engine = ClaudeEngine::new();
        let mut request = RunRequest::new("secret prompt", "/tmp/wd");
        request.model = "claude-sonnet-4-5".to_string();
        let spec = engine.build_spec(&request);
        assert_eq!(spec.stdin.as_deref(), Some("secret prompt"));
        assert!(!spec.args.iter().any(|a| a.contains("secret")));
        assert_eq!(spec.stdio, StdioMode::Pipe);
    }

    #[test]
    fn resume_adds_resume_flag() {
        let engine = ClaudeEngine::new();
        let mut request = RunRequest::new("p", "/tmp/wd");
        request.model = "claude-sonnet-4-5".to_string();
        request.resume_session = Some(SessionId::new("sess-7"));
        let spec = engine.build_spec(&request);
        let args = spec.args.join(" ");
        assert!(args.contains("--resume sess-7"));
    }

    #[test]
    fn config_dir_env_is_set() {
        let engine = ClaudeEngine::new();
        let request = RunRequest::new("p", "/tmp/wd");
        let spec = engine.build_spec(&request);
        assert!(spec.env.iter().any(|(k, _)| k == "CLAUDE_CONFIG_DIR"));
    }
}

mod mcp_config {
    use super::*;

    fn write_backends(dir: &Path) {
        std::fs::create_dir_all(dir.join(".codemachine")).unwrap();
        std::fs::write(
            dir.join(".codemachine/mcp.json"),
            r#"{"files":{"command":"files-mcp","args":["--root","."]}}"#,
        )
        .unwrap();
    }

    #[test]
    fn configure_cleanup_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        write_backends(dir.path());
        let mcp = ClaudeMcp;
        assert!(!mcp.is_configured(dir.path()));

        mcp.configure(dir.path()).unwrap();
        assert!(mcp.is_configured(dir.path()));
        let content = std::fs::read_to_string(dir.path().join(".mcp.json")).unwrap();
        let root: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(root["mcpServers"]["codemachine-files"]["command"], "files-mcp");

        mcp.cleanup(dir.path()).unwrap();
        assert!(!mcp.is_configured(dir.path()));
        assert!(!dir.path().join(".mcp.json").exists());
    }

    #[test]
    fn configure_without_backends_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mcp = ClaudeMcp;
        mcp.configure(dir.path()).unwrap();
        assert!(!dir.path().join(".mcp.json").exists());
        assert!(!mcp.is_configured(dir.path()));
    }

    #[test]
    fn configure_preserves_foreign_servers() {
        let dir = tempfile::tempdir().unwrap();
        write_backends(dir.path());
        std::fs::write(
            dir.path().join(".mcp.json"),
            r#"{"mcpServers":{"github":{"command":"gh-mcp"}}}"#,
        )
        .unwrap();
        let mcp = ClaudeMcp;
        mcp.configure(dir.path()).unwrap();
        mcp.cleanup(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(".mcp.json")).unwrap();
        let root: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert!(root["mcpServers"]["github"].is_object());
        assert!(root["mcpServers"].get("codemachine-files").is_none());
    }
}
