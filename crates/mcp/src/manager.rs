// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend manager: connection fan-out, routing, and forwarding

use crate::backend::{BackendStatus, McpBackend};
use crate::config::{ActiveServer, BackendConfig};
use crate::filter;
use crate::router::{ToolInfo, ToolRouter};
use rmcp::model::CallToolResult;
use std::collections::HashMap;
use thiserror::Error;
use tokio::task::JoinSet;

/// Errors from the MCP layer.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("backend '{0}' failed to connect: {1}")]
    Connect(String, String),

    #[error("backend '{0}' is not connected")]
    NotConnected(String),

    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("tool '{0}' is not allowed by the active server filters")]
    NotAllowed(String),

    #[error("tool call '{0}' failed: {1}")]
    CallFailed(String, String),
}

/// Owns all configured backends and the routing table over their tools.
#[derive(Default)]
pub struct BackendManager {
    backends: HashMap<String, McpBackend>,
    router: ToolRouter,
}

impl BackendManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_backend(&mut self, id: impl Into<String>, config: BackendConfig) {
        let id = id.into();
        self.backends
            .insert(id.clone(), McpBackend::new(id, config));
    }

    /// Connect every backend in parallel, tolerating individual failures.
    ///
    /// Connected backends publish their tools into the routing table in
    /// completion order; failures are reported in the returned statuses and
    /// logged, but never abort the others.
    pub async fn connect_all(&mut self) -> Vec<BackendStatus> {
        let backends = std::mem::take(&mut self.backends);
        let mut join_set = JoinSet::new();
        for (id, mut backend) in backends {
            join_set.spawn(async move {
                let result = backend.connect().await;
                (id, backend, result)
            });
        }
        while let Some(joined) = join_set.join_next().await {
            let Ok((id, backend, result)) = joined else {
                continue;
            };
            if let Err(error) = &result {
                tracing::warn!(backend = %id, %error, "mcp backend failed to connect");
            } else {
                self.router.publish(&id, backend.tools());
            }
            self.backends.insert(id, backend);
        }
        self.statuses()
    }

    /// Disconnect everything, clearing the routing table.
    pub async fn disconnect_all(&mut self) {
        for backend in self.backends.values_mut() {
            backend.disconnect().await;
        }
        self.router = ToolRouter::new();
    }

    /// All published tools, unfiltered.
    pub fn tools(&self) -> &[ToolInfo] {
        self.router.tools()
    }

    /// Tools visible through an active-servers list (empty list ⇒ none).
    pub fn filtered_tools(&self, active: &[ActiveServer]) -> Vec<ToolInfo> {
        filter::filtered_tools(&self.router, active)
    }

    pub fn is_tool_allowed(&self, name: &str, active: &[ActiveServer]) -> bool {
        filter::is_tool_allowed(&self.router, name, active)
    }

    /// Route a tool call to the backend that published it.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, McpError> {
        let backend_id = self
            .router
            .backend_for(name)
            .ok_or_else(|| McpError::UnknownTool(name.to_string()))?
            .to_string();
        let backend = self
            .backends
            .get_mut(&backend_id)
            .ok_or_else(|| McpError::UnknownTool(name.to_string()))?;
        let result = backend.call_tool(name, arguments).await;
        if result.is_err() && !backend.is_connected() {
            // The backend died mid-call; its names must stop routing.
            tracing::warn!(backend = %backend_id, "mcp backend lost, removing its tools");
            self.router.remove_backend(&backend_id);
        }
        result
    }

    /// Filtered variant used by the tool bridge: enforces the active-server
    /// rules before forwarding.
    pub async fn call_allowed_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
        active: &[ActiveServer],
    ) -> Result<CallToolResult, McpError> {
        if !self.is_tool_allowed(name, active) {
            return Err(McpError::NotAllowed(name.to_string()));
        }
        self.call_tool(name, arguments).await
    }

    pub fn statuses(&self) -> Vec<BackendStatus> {
        let mut statuses: Vec<BackendStatus> =
            self.backends.values().map(McpBackend::status).collect();
        statuses.sort_by(|a, b| a.id.cmp(&b.id));
        statuses
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
