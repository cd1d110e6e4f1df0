// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-server tool filtering

use crate::config::ActiveServer;
use crate::router::{ToolInfo, ToolRouter};

/// Tools visible through an active-servers list.
///
/// An empty list yields no tools (opt-in). For each allowed server: `only`
/// keeps exactly those names when present, otherwise all tools minus
/// `exclude`.
pub fn filtered_tools(router: &ToolRouter, active: &[ActiveServer]) -> Vec<ToolInfo> {
    let mut visible = Vec::new();
    for entry in active {
        for tool in router.tools_for(&entry.server) {
            if tool_passes(&tool.name, entry) {
                visible.push(tool.clone());
            }
        }
    }
    visible
}

/// Mirror of [`filtered_tools`] for a single name.
pub fn is_tool_allowed(router: &ToolRouter, name: &str, active: &[ActiveServer]) -> bool {
    let Some(backend) = router.backend_for(name) else {
        return false;
    };
    active
        .iter()
        .any(|entry| entry.server == backend && tool_passes(name, entry))
}

fn tool_passes(name: &str, entry: &ActiveServer) -> bool {
    if let Some(only) = &entry.only {
        return only.iter().any(|allowed| allowed == name);
    }
    if let Some(exclude) = &entry.exclude {
        return !exclude.iter().any(|denied| denied == name);
    }
    true
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
