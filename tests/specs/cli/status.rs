//! `codemachine status` specs

use crate::prelude::*;
use predicates::str::contains;

const SEEDED_TRACKING: &str = r#"{
  "activeTemplate": "default",
  "lastUpdated": "2026-07-01T12:00:00Z",
  "autonomousMode": "false",
  "resumeFromLastStep": true,
  "completedSteps": {
    "0": {"sessionId": "s-0", "monitoringId": 1, "completedAt": "2026-07-01T11:59:00Z"}
  },
  "notCompletedSteps": [1],
  "projectName": "demo"
}"#;

#[test]
fn status_without_tracking_says_so() {
    let project = Project::empty();
    project
        .codemachine()
        .arg("status")
        .assert()
        .success()
        .stdout(contains("no tracking state"));
}

#[test]
fn status_summarizes_steps_and_resume_decision() {
    let project = Project::empty();
    project.file(".codemachine/template.json", SEEDED_TRACKING);
    project
        .codemachine()
        .arg("status")
        .assert()
        .success()
        .stdout(contains("template:        default"))
        .stdout(contains("project:         demo"))
        .stdout(contains("0  completed"))
        .stdout(contains("1  started"))
        .stdout(contains("next run: step 1 (ResumeFromCrash)"));
}

#[test]
fn status_raw_prints_the_file_verbatim() {
    let project = Project::empty();
    project.file(".codemachine/template.json", SEEDED_TRACKING);
    project
        .codemachine()
        .args(["status", "--raw"])
        .assert()
        .success()
        .stdout(contains("\"activeTemplate\": \"default\""));
}

#[test]
fn status_reads_legacy_completed_steps_arrays() {
    let project = Project::empty();
    project.file(
        ".codemachine/template.json",
        r#"{"activeTemplate": "default", "completedSteps": [0, 1]}"#,
    );
    project
        .codemachine()
        .arg("status")
        .assert()
        .success()
        .stdout(contains("0  completed"))
        .stdout(contains("1  completed"))
        .stdout(contains("next run: step 2 (ContinueAfterCompleted)"));
}
