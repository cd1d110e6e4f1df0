// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool routing table

use std::collections::HashMap;

/// One tool as exposed by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub description: Option<String>,
    pub backend: String,
}

/// Maps bare tool names to the backend serving them.
///
/// Collisions override in arrival order: the backend that publishes a name
/// last owns it, and a warning is logged.
#[derive(Debug, Default)]
pub struct ToolRouter {
    tools: Vec<ToolInfo>,
    by_name: HashMap<String, String>,
}

impl ToolRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a connected backend's tools.
    pub fn publish(&mut self, backend: &str, tools: &[ToolInfo]) {
        for tool in tools {
            if let Some(previous) = self.by_name.get(&tool.name) {
                if previous != backend {
                    tracing::warn!(
                        tool = %tool.name,
                        previous = %previous,
                        backend,
                        "tool name collision, later backend wins"
                    );
                    self.tools.retain(|t| t.name != tool.name);
                }
            }
            self.by_name
                .insert(tool.name.clone(), backend.to_string());
            self.tools
                .retain(|t| !(t.name == tool.name && t.backend == backend));
            self.tools.push(tool.clone());
        }
    }

    /// Remove every tool a backend published (backend died or disconnected).
    pub fn remove_backend(&mut self, backend: &str) {
        self.tools.retain(|t| t.backend != backend);
        self.by_name.retain(|_, b| b != backend);
    }

    /// Which backend serves this tool name, if any.
    pub fn backend_for(&self, tool: &str) -> Option<&str> {
        self.by_name.get(tool).map(String::as_str)
    }

    pub fn tools(&self) -> &[ToolInfo] {
        &self.tools
    }

    pub fn tools_for(&self, backend: &str) -> Vec<&ToolInfo> {
        self.tools.iter().filter(|t| t.backend == backend).collect()
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
