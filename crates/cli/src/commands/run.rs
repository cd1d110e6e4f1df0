// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `codemachine run` — execute a workflow template

use crate::workspace;
use anyhow::{Context, Result};
use clap::Args;
use cm_adapters::EngineRegistry;
use cm_core::{Event, SystemClock};
use cm_engine::{
    AgentMonitor, CheckpointDecision, ControlChannel, ControlMessage, EngineDeps, EventBus,
    PlaceholderProcessor, SignalKind, WorkflowEngine, WorkflowOutcome,
};
use cm_manifest::{parse_manifest_with_format, Format, PlaceholderConfig};
use cm_storage::{AgentLogger, StepIndexManager};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Args)]
pub struct RunArgs {
    /// Workflow template name (defaults to the manifest's sole workflow)
    #[arg(long)]
    template: Option<String>,

    /// Path to the workflow manifest
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,
}

pub async fn execute(args: RunArgs, working_dir: PathBuf) -> Result<ExitCode> {
    let codemachine_dir = workspace::bootstrap(&working_dir)?;

    let manifest_path = workspace::find_manifest(&working_dir, args.manifest.as_deref())?;
    let content = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("cannot read {}", manifest_path.display()))?;
    let manifest = Arc::new(
        parse_manifest_with_format(&content, Format::from_path(&manifest_path))
            .with_context(|| format!("invalid manifest {}", manifest_path.display()))?,
    );

    let template = match &args.template {
        Some(name) => manifest
            .get_workflow(name)
            .with_context(|| format!("no workflow named '{name}' in the manifest"))?,
        None => manifest
            .sole_workflow()
            .or_else(|| manifest.get_workflow("default"))
            .context("several workflows defined; pick one with --template")?,
    }
    .clone();

    let mut registry = EngineRegistry::standard();
    if let Some(default_engine) = &manifest.default_engine {
        anyhow::ensure!(
            registry.get(default_engine).is_some(),
            "unknown default engine '{default_engine}'"
        );
        registry.set_default(default_engine.clone());
    }
    let registry = Arc::new(registry);

    let step_index = Arc::new(StepIndexManager::load(
        codemachine_dir.join("template.json"),
        &template.name,
    )?);

    let placeholder_config = if manifest.placeholders.user_dir.is_empty()
        && manifest.placeholders.package_dir.is_empty()
    {
        PlaceholderConfig::standard()
    } else {
        manifest.placeholders.clone()
    };
    let placeholders = Arc::new(PlaceholderProcessor::new(
        placeholder_config,
        &working_dir,
        cm_adapters::env::codemachine_home(),
        Arc::clone(&step_index) as Arc<dyn cm_engine::ContextLookup>,
    ));

    let bus = Arc::new(EventBus::new());
    let control = ControlChannel::new();
    subscribe_console(&bus);
    spawn_stdin_bridge(control.clone());

    let engine = WorkflowEngine::new(
        EngineDeps {
            manifest,
            registry,
            monitor: Arc::new(AgentMonitor::new(Arc::new(SystemClock))),
            logger: Arc::new(AgentLogger::new(codemachine_dir.join("logs"))),
            placeholders,
            step_index,
            bus,
            control,
            working_dir,
        },
        template,
    );

    match engine.run().await? {
        WorkflowOutcome::Completed => {
            println!("workflow completed");
            Ok(ExitCode::SUCCESS)
        }
        WorkflowOutcome::Stopped { reason } => {
            println!("workflow stopped{}", fmt_reason(reason.as_deref()));
            Ok(ExitCode::SUCCESS)
        }
        WorkflowOutcome::Paused => {
            println!("workflow paused; run `codemachine run` again to resume");
            Ok(ExitCode::SUCCESS)
        }
        WorkflowOutcome::Error { reason } => {
            eprintln!("workflow failed: {reason}");
            Ok(ExitCode::from(1))
        }
    }
}

fn fmt_reason(reason: Option<&str>) -> String {
    reason.map(|r| format!(" ({r})")).unwrap_or_default()
}

/// Minimal headless view: stream agent output and prompts to the console.
fn subscribe_console(bus: &Arc<EventBus>) {
    bus.subscribe(|event| match event {
        Event::MessageLog { line, .. } => println!("{line}"),
        Event::UiElement { label, .. } => println!("{label}"),
        Event::StepStarted {
            step_index,
            agent_id,
        } => println!("── step {step_index}: {agent_id} ──"),
        Event::CheckpointState { reason, .. } => {
            let reason = reason.as_deref().unwrap_or("checkpoint reached");
            println!("⏸ {reason} — type /continue or /quit");
        }
        Event::InputStateSet {
            state: cm_core::InputState::Waiting,
        } => println!("› waiting for input (empty line to advance, /skip, /stop)"),
        Event::WorkflowError { reason } => eprintln!("✗ {reason}"),
        _ => {}
    });
}

/// Translate stdin lines into control messages.
///
/// `/skip`, `/stop`, `/pause`, `/auto on|off`, `/continue`, `/quit` are
/// commands; anything else is a user prompt (empty line advances).
fn spawn_stdin_bridge(control: ControlChannel) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let message = match line.trim() {
                "/skip" => ControlMessage::Input {
                    prompt: None,
                    skip: true,
                },
                "/stop" => ControlMessage::Signal(SignalKind::Stop),
                "/pause" => ControlMessage::Signal(SignalKind::Pause),
                "/auto on" => ControlMessage::Signal(SignalKind::ModeChange { auto_mode: true }),
                "/auto off" => ControlMessage::Signal(SignalKind::ModeChange { auto_mode: false }),
                "/continue" => ControlMessage::CheckpointResolution {
                    decision: CheckpointDecision::Continue,
                },
                "/quit" => ControlMessage::CheckpointResolution {
                    decision: CheckpointDecision::Quit,
                },
                text => ControlMessage::Input {
                    prompt: Some(text.to_string()),
                    skip: false,
                },
            };
            control.send(message);
        }
    });
}
