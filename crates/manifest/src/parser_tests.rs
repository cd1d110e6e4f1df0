// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::workflow::StepBehavior;

const BASIC_TOML: &str = r#"
default_engine = "claude"

[agents.planner]
name = "Planner"
prompt_path = "prompts/plan.md"

[agents.coder]
name = "Coder"
engine = "codex"
model = "gpt-5-codex"
prompt_path = ["prompts/code.md", "prompts/conventions.md"]
chained_prompts = ["prompts/code-review.md"]

[agents.fixer]
name = "Fixer"
prompt_path = "prompts/fix.md"

[[workflows.default.steps]]
agent = "planner"
execute_once = true

[[workflows.default.steps]]
label = "— build phase —"

[[workflows.default.steps]]
agent = "coder"
not_completed_fallback = "fixer"

[workflows.default.steps.behavior]
type = "loop"
max_iterations = 3
steps_back = 2
"#;

#[test]
fn parses_basic_toml_manifest() {
    let manifest = parse_manifest(BASIC_TOML).unwrap();
    assert_eq!(manifest.agents.len(), 3);
    assert_eq!(manifest.default_engine, Some(EngineId::new("claude")));

    let planner = manifest.get_agent(&AgentId::new("planner")).unwrap();
    assert_eq!(planner.id, AgentId::new("planner"));
    assert_eq!(planner.name, "Planner");

    let workflow = manifest.get_workflow("default").unwrap();
    assert_eq!(workflow.name, "default");
    assert_eq!(workflow.steps.len(), 3);
    assert!(workflow.steps[1].as_module().is_none());

    let coder_step = workflow.steps[2].as_module().unwrap();
    assert_eq!(coder_step.agent, AgentId::new("coder"));
    assert_eq!(
        coder_step.behavior,
        Some(StepBehavior::Loop {
            max_iterations: 3,
            steps_back: 2
        })
    );
}

#[test]
fn agent_name_defaults_to_map_key() {
    let manifest = parse_manifest(
        r#"
        [agents.scout]
        prompt_path = "prompts/scout.md"

        [[workflows.w.steps]]
        agent = "scout"
        "#,
    )
    .unwrap();
    assert_eq!(manifest.agents["scout"].name, "scout");
}

#[test]
fn unknown_step_agent_is_rejected() {
    let err = parse_manifest(
        r#"
        [agents.planner]
        prompt_path = "p.md"

        [[workflows.w.steps]]
        agent = "ghost"
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("unknown agent 'ghost'"));
}

#[test]
fn zero_steps_back_is_rejected() {
    let err = parse_manifest(
        r#"
        [agents.a]
        prompt_path = "p.md"

        [[workflows.w.steps]]
        agent = "a"
        behavior = { type = "loop", max_iterations = 2, steps_back = 0 }
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("steps_back"));
}

#[test]
fn unknown_controller_is_rejected() {
    let err = parse_manifest(
        r#"
        [agents.a]
        prompt_path = "p.md"

        [workflows.w]
        controller = { agent_id = "ghost" }

        [[workflows.w.steps]]
        agent = "a"
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("controller"));
}

#[test]
fn parses_json_manifest() {
    let manifest = parse_manifest_with_format(
        r#"{
            "agents": {"a": {"prompt_path": "p.md"}},
            "workflows": {"w": {"steps": [{"agent": "a"}]}}
        }"#,
        Format::Json,
    )
    .unwrap();
    assert_eq!(manifest.workflows["w"].steps.len(), 1);
}

#[test]
fn format_inferred_from_extension() {
    use std::path::Path;
    assert_eq!(Format::from_path(Path::new("wf.toml")), Format::Toml);
    assert_eq!(Format::from_path(Path::new("wf.hcl")), Format::Hcl);
    assert_eq!(Format::from_path(Path::new("wf.json")), Format::Json);
    assert_eq!(Format::from_path(Path::new("wf")), Format::Toml);
}

#[test]
fn referenced_engines_resolve_in_priority_order() {
    let manifest = parse_manifest(BASIC_TOML).unwrap();
    let workflow = manifest.get_workflow("default").unwrap();
    let engines = manifest.referenced_engines(workflow, &EngineId::new("claude"));
    // planner falls back to default, coder names codex
    assert_eq!(engines, vec![EngineId::new("claude"), EngineId::new("codex")]);
}

#[test]
fn empty_workflow_is_rejected() {
    let err = parse_manifest(
        r#"
        [agents.a]
        prompt_path = "p.md"

        [workflows.w]
        steps = []
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("no steps"));
}
