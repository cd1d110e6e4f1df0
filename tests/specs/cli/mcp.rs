//! `codemachine mcp` specs

use crate::prelude::*;
use predicates::str::contains;

const BACKENDS: &str = r#"{"files":{"command":"files-mcp","args":["--root","."]}}"#;

#[test]
fn status_reports_per_engine_support() {
    let project = Project::empty();
    project
        .codemachine()
        .args(["mcp", "status"])
        .assert()
        .success()
        .stdout(contains("claude: not configured"))
        .stdout(contains("codex: mcp not supported"));
}

#[test]
fn configure_mirrors_declared_backends_and_cleanup_removes_them() {
    let project = Project::empty();
    project.file(".codemachine/mcp.json", BACKENDS);

    project
        .codemachine()
        .args(["mcp", "configure"])
        .assert()
        .success()
        .stdout(contains("claude: configured"));

    let client_config: serde_json::Value =
        serde_json::from_str(&project.read(".mcp.json")).unwrap();
    assert_eq!(
        client_config["mcpServers"]["codemachine-files"]["command"],
        "files-mcp"
    );

    project
        .codemachine()
        .args(["mcp", "status"])
        .assert()
        .success()
        .stdout(contains("claude: configured"));

    project
        .codemachine()
        .args(["mcp", "cleanup"])
        .assert()
        .success()
        .stdout(contains("claude: cleaned"));
    assert!(!project.path().join(".mcp.json").exists());
}

#[test]
fn status_reports_unreachable_backends_without_failing() {
    let project = Project::empty();
    project.file(
        ".codemachine/mcp.json",
        r#"{"broken":{"command":"definitely-not-a-real-mcp-server"}}"#,
    );
    project
        .codemachine()
        .args(["mcp", "status"])
        .assert()
        .success()
        .stdout(contains("backend broken: down"));
}

#[test]
fn tools_without_backends_is_informative() {
    let project = Project::empty();
    project
        .codemachine()
        .args(["mcp", "tools"])
        .assert()
        .success()
        .stdout(contains("no backends declared"));
}
