// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `codemachine mcp` — per-engine client config and backend health

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use cm_adapters::EngineRegistry;
use cm_mcp::{BackendConfig, BackendManager};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Args)]
pub struct McpArgs {
    #[command(subcommand)]
    command: McpCommand,
}

#[derive(Subcommand)]
enum McpCommand {
    /// Install MCP client config for every engine that supports it
    Configure,
    /// Remove the installed client config
    Cleanup,
    /// Show per-engine config state and backend health
    Status,
    /// Connect all backends and list their aggregated tools
    Tools,
}

pub async fn execute(args: McpArgs, working_dir: PathBuf) -> Result<ExitCode> {
    let registry = EngineRegistry::standard();
    match args.command {
        McpCommand::Configure => {
            for id in registry.ids() {
                let Some(engine) = registry.get(&id) else {
                    continue;
                };
                match engine.mcp() {
                    Some(mcp) if mcp.supported() => {
                        mcp.configure(&working_dir)
                            .with_context(|| format!("configuring mcp for {id}"))?;
                        println!("{id}: configured");
                    }
                    _ => println!("{id}: mcp not supported"),
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        McpCommand::Cleanup => {
            for id in registry.ids() {
                let Some(engine) = registry.get(&id) else {
                    continue;
                };
                if let Some(mcp) = engine.mcp().filter(|m| m.supported()) {
                    mcp.cleanup(&working_dir)
                        .with_context(|| format!("cleaning mcp for {id}"))?;
                    println!("{id}: cleaned");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        McpCommand::Status => {
            for id in registry.ids() {
                let Some(engine) = registry.get(&id) else {
                    continue;
                };
                match engine.mcp() {
                    Some(mcp) if mcp.supported() => {
                        let state = if mcp.is_configured(&working_dir) {
                            "configured"
                        } else {
                            "not configured"
                        };
                        println!("{id}: {state}");
                    }
                    _ => println!("{id}: mcp not supported"),
                }
            }
            let mut manager = load_backends(&working_dir)?;
            if let Some(manager) = manager.as_mut() {
                for status in manager.connect_all().await {
                    let health = if status.connected {
                        format!("connected, {} tools", status.tool_count)
                    } else {
                        format!("down ({})", status.error.unwrap_or_default())
                    };
                    println!("backend {}: {}", status.id, health);
                }
                manager.disconnect_all().await;
            }
            Ok(ExitCode::SUCCESS)
        }
        McpCommand::Tools => {
            let Some(mut manager) = load_backends(&working_dir)? else {
                println!("no backends declared (.codemachine/mcp.json is absent)");
                return Ok(ExitCode::SUCCESS);
            };
            manager.connect_all().await;
            for tool in manager.tools() {
                println!(
                    "{:<30} {:<12} {}",
                    tool.name,
                    tool.backend,
                    tool.description.as_deref().unwrap_or("")
                );
            }
            manager.disconnect_all().await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Backend declarations live in `.codemachine/mcp.json`.
fn load_backends(working_dir: &Path) -> Result<Option<BackendManager>> {
    let path = working_dir.join(".codemachine").join("mcp.json");
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    let configs: HashMap<String, BackendConfig> = serde_json::from_str(&content)
        .with_context(|| format!("invalid backend config {}", path.display()))?;
    let mut manager = BackendManager::new();
    for (id, config) in configs {
        manager.add_backend(id, config);
    }
    Ok(Some(manager))
}
