// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bus::EventBus;
use crate::placeholder::NoContext;
use cm_adapters::{AbortHandle, FakeEngine, FakeRun};
use cm_core::{AgentId, AgentStatus, EngineId, FakeClock, Telemetry};
use cm_manifest::{AgentRole, PlaceholderConfig};
use cm_storage::StepIndexManager;
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    engine: Arc<FakeEngine>,
    runner: StepRunner,
    monitor: Arc<AgentMonitor>,
    logger: Arc<AgentLogger>,
    step_index: Arc<StepIndexManager>,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(FakeEngine::with_id("fake"));
    let mut registry = EngineRegistry::new(EngineId::new("fake"));
    registry.register(Arc::clone(&engine) as Arc<dyn EngineAdapter>);
    let registry = Arc::new(registry);

    let monitor = Arc::new(AgentMonitor::new(Arc::new(FakeClock::at(1_000))));
    let logger = Arc::new(AgentLogger::new(dir.path().join(".codemachine/logs")));
    let step_index = Arc::new(
        StepIndexManager::load(dir.path().join(".codemachine/template.json"), "t").unwrap(),
    );
    let placeholders = Arc::new(PlaceholderProcessor::new(
        PlaceholderConfig::default(),
        dir.path(),
        dir.path(),
        Arc::new(NoContext),
    ));
    let emitter = Emitter::new(Arc::new(EventBus::new()));
    let runner = StepRunner::new(
        registry,
        Arc::clone(&monitor),
        Arc::clone(&logger),
        placeholders,
        Arc::clone(&step_index),
        emitter,
        dir.path().to_path_buf(),
    );
    Fixture {
        dir,
        engine,
        runner,
        monitor,
        logger,
        step_index,
    }
}

fn agent(fixture: &Fixture, id: &str, prompts: &[(&str, &str)]) -> AgentDefinition {
    let paths: Vec<PathBuf> = prompts
        .iter()
        .map(|(file, content)| {
            let path = fixture.dir.path().join(file);
            std::fs::write(&path, content).unwrap();
            PathBuf::from(file)
        })
        .collect();
    AgentDefinition {
        id: AgentId::new(id),
        name: id.to_string(),
        role: AgentRole::Regular,
        engine: None,
        model: None,
        prompt_path: if paths.len() == 1 {
            PromptPath::Single(paths.into_iter().next().unwrap())
        } else {
            PromptPath::Many(paths)
        },
        model_reasoning_effort: None,
        not_completed_fallback: None,
        chained_prompts: vec![],
    }
}

fn module(id: &str) -> ModuleStep {
    ModuleStep {
        agent: AgentId::new(id),
        engine: None,
        model: None,
        prompt_path: None,
        execute_once: false,
        not_completed_fallback: None,
        behavior: None,
    }
}

#[tokio::test]
async fn run_step_happy_path_wires_everything() {
    let fixture = fixture();
    fixture.engine.enqueue(
        FakeRun::completing("all done")
            .with_session("s-1")
            .with_lines(&["working", "finished"])
            .with_telemetry(Telemetry {
                tokens_in: 100,
                tokens_out: 20,
                ..Default::default()
            }),
    );
    let agent = agent(&fixture, "planner", &[("plan.md", "plan the work")]);

    let outcome = fixture
        .runner
        .run_step(0, &module("planner"), &agent, AbortSignal::never())
        .await
        .unwrap();

    assert_eq!(outcome.output, "all done");
    assert_eq!(outcome.session_id, Some(SessionId::new("s-1")));
    assert_eq!(outcome.directive, None);

    // monitor: completed with telemetry and duration accounting
    let record = fixture.monitor.get_agent(outcome.monitoring_id).unwrap();
    assert_eq!(record.status, AgentStatus::Completed);
    assert_eq!(record.telemetry.tokens_in, 100);
    assert_eq!(record.session_id, Some(SessionId::new("s-1")));

    // tracking: started + session persisted (completion is the engine's job)
    assert_eq!(fixture.step_index.get_not_completed_steps(), vec![0]);
    let data = fixture.step_index.get_step_data(0).unwrap();
    assert_eq!(data.session_id, "s-1");
    assert_eq!(data.monitoring_id, outcome.monitoring_id.as_u64());

    // log: prompt header then streamed lines, in order
    let (log, _) = fixture.logger.read(outcome.monitoring_id, 0, None).unwrap();
    assert!(log.starts_with("=== prompt ===\nplan the work\n=== output ===\n"));
    let body = log.split("=== output ===\n").nth(1).unwrap();
    assert_eq!(body, "working\nfinished\n");
}

#[tokio::test]
async fn prompt_files_join_with_blank_line() {
    let fixture = fixture();
    let agent = agent(
        &fixture,
        "coder",
        &[("a.md", "part one\n"), ("b.md", "part two")],
    );
    fixture
        .runner
        .run_step(0, &module("coder"), &agent, AbortSignal::never())
        .await
        .unwrap();
    assert_eq!(fixture.engine.calls()[0].prompt, "part one\n\npart two");
}

#[tokio::test]
async fn missing_prompt_file_is_a_clear_error() {
    let fixture = fixture();
    let agent = AgentDefinition {
        prompt_path: PromptPath::Single(PathBuf::from("nope.md")),
        ..agent(&fixture, "ghost", &[("unused.md", "x")])
    };
    let err = fixture
        .runner
        .run_step(0, &module("ghost"), &agent, AbortSignal::never())
        .await
        .unwrap_err();
    assert!(matches!(err, StepError::PromptNotFound(_)));
}

#[tokio::test]
async fn failure_without_session_marks_failed() {
    let fixture = fixture();
    fixture.engine.enqueue(FakeRun::failing("rate limited"));
    let agent = agent(&fixture, "a", &[("p.md", "x")]);
    let err = fixture
        .runner
        .run_step(0, &module("a"), &agent, AbortSignal::never())
        .await
        .unwrap_err();
    assert!(!err.is_abort());

    let record = &fixture.monitor.get_all_agents()[0];
    assert_eq!(record.status, AgentStatus::Failed);
    assert!(record.error.as_deref().unwrap().contains("rate limited"));
}

#[tokio::test]
async fn failure_with_session_pauses_instead() {
    let fixture = fixture();
    fixture
        .engine
        .enqueue(FakeRun::failing("network blip").with_session("s-2"));
    let agent = agent(&fixture, "a", &[("p.md", "x")]);
    fixture
        .runner
        .run_step(0, &module("a"), &agent, AbortSignal::never())
        .await
        .unwrap_err();

    let record = &fixture.monitor.get_all_agents()[0];
    assert_eq!(record.status, AgentStatus::Paused);
    assert_eq!(record.session_id, Some(SessionId::new("s-2")));
}

#[tokio::test]
async fn abort_rethrows_and_never_completes() {
    let fixture = fixture();
    fixture.engine.enqueue(FakeRun::hanging());
    let agent = agent(&fixture, "a", &[("p.md", "x")]);

    let handle = AbortHandle::new();
    let signal = handle.signal();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.abort();
    });

    let err = fixture
        .runner
        .run_step(0, &module("a"), &agent, signal)
        .await
        .unwrap_err();
    assert!(err.is_abort());
    let record = &fixture.monitor.get_all_agents()[0];
    assert_ne!(record.status, AgentStatus::Completed);
}

#[tokio::test]
async fn resume_sends_steering_into_the_same_session() {
    let fixture = fixture();
    fixture
        .engine
        .enqueue(FakeRun::completing("first").with_session("s-1"));
    fixture
        .engine
        .enqueue(FakeRun::completing("second").with_session("s-1"));
    let agent = agent(&fixture, "a", &[("p.md", "x")]);
    let module = module("a");

    let first = fixture
        .runner
        .run_step(0, &module, &agent, AbortSignal::never())
        .await
        .unwrap();
    let second = fixture
        .runner
        .resume_step(
            0,
            &module,
            &agent,
            first.monitoring_id,
            SessionId::new("s-1"),
            "focus on A",
            AbortSignal::never(),
        )
        .await
        .unwrap();

    assert_eq!(second.output, "second");
    let calls = fixture.engine.calls();
    assert_eq!(calls[1].prompt, "focus on A");
    assert_eq!(calls[1].resume_session, Some(SessionId::new("s-1")));
}

#[tokio::test]
async fn resume_with_empty_steering_uses_the_canned_prompt() {
    let fixture = fixture();
    fixture
        .engine
        .enqueue(FakeRun::completing("first").with_session("s-1"));
    let agent = agent(&fixture, "a", &[("p.md", "x")]);
    let module = module("a");
    let first = fixture
        .runner
        .run_step(0, &module, &agent, AbortSignal::never())
        .await
        .unwrap();
    fixture
        .runner
        .resume_step(
            0,
            &module,
            &agent,
            first.monitoring_id,
            SessionId::new("s-1"),
            "  ",
            AbortSignal::never(),
        )
        .await
        .unwrap();
    assert_eq!(
        fixture.engine.calls()[1].prompt,
        "Continue from where you left off."
    );
}

#[tokio::test]
async fn trailing_directive_is_captured() {
    let fixture = fixture();
    fixture.engine.enqueue(FakeRun::completing(
        "done\n```json\n{\"action\":\"stop\",\"reason\":\"enough\"}\n```",
    ));
    let agent = agent(&fixture, "a", &[("p.md", "x")]);
    let outcome = fixture
        .runner
        .run_step(0, &module("a"), &agent, AbortSignal::never())
        .await
        .unwrap();
    assert_eq!(
        outcome.directive,
        Some(Directive::Stop {
            reason: Some("enough".to_string())
        })
    );
}

#[tokio::test]
async fn sidecar_directive_wins_over_trailing_block() {
    let fixture = fixture();
    std::fs::write(
        fixture.dir.path().join("directive.json"),
        r#"{"action":"checkpoint"}"#,
    )
    .unwrap();
    fixture
        .engine
        .enqueue(FakeRun::completing("```json\n{\"action\":\"stop\"}\n```"));
    let agent = agent(&fixture, "a", &[("p.md", "x")]);
    let outcome = fixture
        .runner
        .run_step(0, &module("a"), &agent, AbortSignal::never())
        .await
        .unwrap();
    assert_eq!(outcome.directive, Some(Directive::Checkpoint { reason: None }));
    assert!(!fixture.dir.path().join("directive.json").exists());
}

#[tokio::test]
async fn sub_agent_runs_under_parent_and_leaves_tracking_alone() {
    let fixture = fixture();
    let parent_agent = agent(&fixture, "a", &[("p.md", "x")]);
    let parent = fixture
        .runner
        .run_step(0, &module("a"), &parent_agent, AbortSignal::never())
        .await
        .unwrap();

    let tracking_before = fixture.step_index.snapshot();
    let sub = agent(&fixture, "security-check", &[("sub.md", "audit this")]);
    let outcome = fixture
        .runner
        .execute_sub_agent(Some(parent.monitoring_id), &sub, true, AbortSignal::never())
        .await
        .unwrap();

    let record = fixture.monitor.get_agent(outcome.monitoring_id).unwrap();
    assert_eq!(record.parent, Some(parent.monitoring_id));
    assert_eq!(record.status, AgentStatus::Completed);

    let tracking_after = fixture.step_index.snapshot();
    assert_eq!(
        tracking_before.completed_steps.len(),
        tracking_after.completed_steps.len()
    );
    assert_eq!(
        tracking_before.not_completed_steps,
        tracking_after.not_completed_steps
    );
}
