// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variable helpers for the adapters crate

use std::path::PathBuf;
use std::time::Duration;

/// Default per-run timeout for engine subprocesses.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(1800);

/// Grace window between soft termination and hard kill.
pub const KILL_GRACE: Duration = Duration::from_secs(5);

/// Whether engine auth checks are bypassed (`CODEMACHINE_SKIP_AUTH=1`).
///
/// Used by tests and CI where no credentials exist but engines are faked.
pub fn skip_auth() -> bool {
    std::env::var("CODEMACHINE_SKIP_AUTH").is_ok_and(|v| v == "1" || v == "true")
}

/// Per-run engine timeout, overridable for integration tests.
pub fn run_timeout() -> Duration {
    match std::env::var("CODEMACHINE_RUN_TIMEOUT_SECS") {
        Ok(val) => Duration::from_secs(val.parse().unwrap_or(1800)),
        Err(_) => DEFAULT_RUN_TIMEOUT,
    }
}

/// Root of per-user codemachine state (`CODEMACHINE_HOME` or `~/.codemachine`).
pub fn codemachine_home() -> PathBuf {
    if let Ok(home) = std::env::var("CODEMACHINE_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".codemachine")
}

/// Directory holding imported prompt packs, consulted before the working
/// dir when resolving prompt paths.
pub fn imports_dir() -> Option<PathBuf> {
    std::env::var("CODEMACHINE_IMPORTS_DIR").ok().map(PathBuf::from)
}
