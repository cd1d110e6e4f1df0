//! End-to-end `codemachine run` specs against a stubbed engine

use crate::prelude::*;
use predicates::str::contains;

#[test]
#[cfg(unix)]
fn run_completes_a_two_step_workflow() {
    let project = Project::with_manifest();
    project.stub_claude(CLAUDE_STUB_OK);

    project
        .codemachine()
        .arg("run")
        .assert()
        .success()
        .stdout(contains("workflow completed"));

    // both steps are fully done on disk
    let tracking = project.tracking();
    for step in ["0", "1"] {
        assert!(
            tracking["completedSteps"][step]["completedAt"].is_string(),
            "step {step} missing completedAt: {tracking}"
        );
        assert_eq!(tracking["completedSteps"][step]["sessionId"], "stub-session");
    }
    assert_eq!(tracking["notCompletedSteps"], serde_json::json!([]));

    // one log file per agent run, streamed output inside
    let logs: Vec<_> = std::fs::read_dir(project.path().join(".codemachine/logs"))
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with("agent-"))
        .collect();
    assert_eq!(logs.len(), 2, "expected one log per step");
    let first = std::fs::read_to_string(logs[0].path()).unwrap();
    assert!(first.contains("=== prompt ==="));
    assert!(first.contains("stub reply"));
}

#[test]
#[cfg(unix)]
fn rerun_after_completion_exits_clean() {
    let project = Project::with_manifest();
    project.stub_claude(CLAUDE_STUB_OK);

    project.codemachine().arg("run").assert().success();
    project
        .codemachine()
        .arg("run")
        .assert()
        .success()
        .stdout(contains("workflow completed"));
}

#[test]
#[cfg(unix)]
fn stop_directive_from_the_agent_stops_the_run() {
    let project = Project::with_manifest();
    project.stub_claude(CLAUDE_STUB_STOP);

    project
        .codemachine()
        .arg("run")
        .assert()
        .success()
        .stdout(contains("workflow stopped"));

    // the stopped step stays in crash-recovery state for the next run
    let tracking = project.tracking();
    assert_eq!(tracking["notCompletedSteps"], serde_json::json!([0]));
    assert!(tracking["completedSteps"]["0"]["completedAt"].is_null());
}

#[test]
fn missing_engine_binary_fails_with_install_hint() {
    let project = Project::with_manifest();
    // no stub, and PATH reduced to the empty project bin dir
    project
        .codemachine()
        .env("PATH", project.bin_dir())
        .arg("run")
        .assert()
        .code(1)
        .stderr(contains("'claude' was not found on PATH"))
        .stderr(contains("npm install -g @anthropic-ai/claude-code"));
}
