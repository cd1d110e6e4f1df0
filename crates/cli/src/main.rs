// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! codemachine - agent workflow orchestrator CLI

mod commands;
mod logging;
mod workspace;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{mcp, run, status};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "codemachine",
    version,
    about = "codemachine - drive declarative agent workflows"
)]
struct Cli {
    /// Change to <dir> before doing anything
    #[arg(short = 'C', global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow template
    Run(run::RunArgs),
    /// Show tracking state for the current workspace
    Status(status::StatusArgs),
    /// MCP configuration and backend health
    Mcp(mcp::McpArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = logging::init();

    let working_dir = match workspace::resolve_working_dir(cli.directory.as_deref()) {
        Ok(dir) => dir,
        Err(error) => {
            eprintln!("error: {error:#}");
            return ExitCode::from(1);
        }
    };

    let result: Result<ExitCode> = match cli.command {
        Commands::Run(args) => run_async(run::execute(args, working_dir)),
        Commands::Status(args) => status::execute(args, working_dir),
        Commands::Mcp(args) => run_async(mcp::execute(args, working_dir)),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}

fn run_async(future: impl std::future::Future<Output = Result<ExitCode>>) -> Result<ExitCode> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(future)
}
