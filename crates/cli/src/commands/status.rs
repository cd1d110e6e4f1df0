// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `codemachine status` — tracking summary for the workspace

use anyhow::Result;
use clap::Args;
use cm_storage::{StepIndexManager, StepPhase};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Args)]
pub struct StatusArgs {
    /// Print the raw template.json instead of a summary
    #[arg(long)]
    raw: bool,
}

pub fn execute(args: StatusArgs, working_dir: PathBuf) -> Result<ExitCode> {
    let path = working_dir.join(".codemachine").join("template.json");
    if !path.exists() {
        println!("no tracking state ({} is absent)", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    if args.raw {
        print!("{}", std::fs::read_to_string(&path)?);
        return Ok(ExitCode::SUCCESS);
    }

    let index = StepIndexManager::load(&path, "")?;
    let snapshot = index.snapshot();
    println!("template:        {}", snapshot.active_template);
    println!("autonomous mode: {}", snapshot.autonomous_mode.as_str());
    println!("last updated:    {}", snapshot.last_updated);
    if !snapshot.project_name.is_empty() {
        println!("project:         {}", snapshot.project_name);
    }

    let mut indices: Vec<usize> = snapshot.completed_steps.keys().copied().collect();
    for &step in &snapshot.not_completed_steps {
        if !indices.contains(&step) {
            indices.push(step);
        }
    }
    indices.sort_unstable();

    if indices.is_empty() {
        println!("no steps recorded yet");
    } else {
        println!("steps:");
        for step in indices {
            let phase = match index.get_step_phase(step) {
                StepPhase::NotStarted => "not started",
                StepPhase::Started => "started",
                StepPhase::SessionInitialized => "session open",
                StepPhase::ChainInProgress => "mid-chain",
                StepPhase::Completed => "completed",
            };
            println!("  {step:>3}  {phase}");
        }
    }

    let resume = index.get_resume_info();
    println!(
        "next run: step {} ({:?})",
        resume.start_index, resume.decision
    );
    Ok(ExitCode::SUCCESS)
}
