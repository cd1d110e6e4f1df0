//! CLI error handling specs
//!
//! Verify error messages and exit codes for broken workspaces.

use crate::prelude::*;
use predicates::str::contains;

#[test]
fn run_without_a_manifest_fails() {
    let project = Project::empty();
    project
        .codemachine()
        .arg("run")
        .assert()
        .code(1)
        .stderr(contains("no workflow manifest found"));
}

#[test]
fn run_with_an_invalid_manifest_names_the_problem() {
    let project = Project::empty();
    project.file(
        ".codemachine/workflow.toml",
        r#"
        [agents.planner]
        prompt_path = "prompts/plan.md"

        [[workflows.default.steps]]
        agent = "ghost"
        "#,
    );
    project
        .codemachine()
        .arg("run")
        .assert()
        .code(1)
        .stderr(contains("unknown agent 'ghost'"));
}

#[test]
fn run_with_an_unknown_template_fails() {
    let project = Project::with_manifest();
    project
        .codemachine()
        .args(["run", "--template", "nope"])
        .assert()
        .code(1)
        .stderr(contains("no workflow named 'nope'"));
}

#[test]
fn run_with_an_unknown_default_engine_fails() {
    let project = Project::empty();
    project.file(
        ".codemachine/workflow.toml",
        r#"
        default_engine = "hal9000"

        [agents.planner]
        prompt_path = "prompts/plan.md"

        [[workflows.default.steps]]
        agent = "planner"
        "#,
    );
    project
        .codemachine()
        .arg("run")
        .assert()
        .code(1)
        .stderr(contains("unknown default engine 'hal9000'"));
}

#[test]
fn missing_prompt_file_surfaces_as_workflow_error() {
    let project = Project::empty();
    project.file(".codemachine/workflow.toml", MINIMAL_MANIFEST);
    // prompt files deliberately absent
    project
        .codemachine()
        .arg("run")
        .assert()
        .code(1)
        .stderr(contains("prompt file not found"));
}
