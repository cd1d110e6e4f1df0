// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace resolution and bootstrap

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Resolve the working dir: `-C` flag, `CODEMACHINE_CWD`, else the
/// process cwd.
pub fn resolve_working_dir(flag: Option<&Path>) -> Result<PathBuf> {
    let dir = match flag {
        Some(dir) => dir.to_path_buf(),
        None => match std::env::var("CODEMACHINE_CWD") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => std::env::current_dir().context("cannot determine current directory")?,
        },
    };
    let dir = dir
        .canonicalize()
        .with_context(|| format!("working directory does not exist: {}", dir.display()))?;
    Ok(dir)
}

/// Create the `.codemachine` layout on first run.
pub fn bootstrap(working_dir: &Path) -> Result<PathBuf> {
    let root = working_dir.join(".codemachine");
    for sub in ["logs", "artifacts"] {
        std::fs::create_dir_all(root.join(sub))
            .with_context(|| format!("cannot create {}", root.join(sub).display()))?;
    }
    Ok(root)
}

/// Locate the workflow manifest: explicit path, else the first of
/// `.codemachine/workflow.{toml,hcl,json}`.
pub fn find_manifest(working_dir: &Path, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            working_dir.join(path)
        };
        anyhow::ensure!(path.exists(), "manifest not found: {}", path.display());
        return Ok(path);
    }
    for name in ["workflow.toml", "workflow.hcl", "workflow.json"] {
        let candidate = working_dir.join(".codemachine").join(name);
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    anyhow::bail!(
        "no workflow manifest found under {}/.codemachine (expected workflow.toml)",
        working_dir.display()
    )
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
