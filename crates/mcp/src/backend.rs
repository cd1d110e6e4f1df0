// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One stdio MCP backend server

use crate::config::BackendConfig;
use crate::manager::McpError;
use crate::router::ToolInfo;
use rmcp::model::{CallToolRequestParam, CallToolResult, ClientCapabilities, ClientInfo, Implementation};
use rmcp::service::RunningService;
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use tokio::process::Command;

type Client = RunningService<RoleClient, ClientInfo>;

/// Point-in-time health of a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    pub id: String,
    pub connected: bool,
    pub tool_count: usize,
    pub error: Option<String>,
}

/// A managed MCP server child process.
///
/// Owned by the [`crate::BackendManager`]; `connect` spawns the server over
/// stdio, performs the protocol handshake, and caches the tool list.
pub struct McpBackend {
    id: String,
    config: BackendConfig,
    client: Option<Client>,
    tools: Vec<ToolInfo>,
    last_error: Option<String>,
}

impl McpBackend {
    pub fn new(id: impl Into<String>, config: BackendConfig) -> Self {
        Self {
            id: id.into(),
            config,
            client: None,
            tools: Vec::new(),
            last_error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub fn tools(&self) -> &[ToolInfo] {
        &self.tools
    }

    pub fn status(&self) -> BackendStatus {
        BackendStatus {
            id: self.id.clone(),
            connected: self.is_connected(),
            tool_count: self.tools.len(),
            error: self.last_error.clone(),
        }
    }

    /// Spawn the server, handshake, and cache its tool list.
    pub async fn connect(&mut self) -> Result<(), McpError> {
        if self.client.is_some() {
            return Ok(());
        }
        let config = self.config.clone();
        let transport = TokioChildProcess::new(Command::new(&config.command).configure(|cmd| {
            for arg in &config.args {
                cmd.arg(arg);
            }
            for (key, value) in &config.env {
                cmd.env(key, value);
            }
        }))
        .map_err(|e| self.record_error(McpError::Connect(self.id.clone(), e.to_string())))?;

        let client_info = ClientInfo {
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "codemachine".to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                website_url: None,
                icons: None,
            },
        };

        let client = client_info
            .serve(transport)
            .await
            .map_err(|e| self.record_error(McpError::Connect(self.id.clone(), e.to_string())))?;

        let listed = client
            .list_tools(Default::default())
            .await
            .map_err(|e| self.record_error(McpError::Connect(self.id.clone(), e.to_string())))?;

        self.tools = listed
            .tools
            .into_iter()
            .map(|tool| ToolInfo {
                name: tool.name.to_string(),
                description: tool.description.map(|d| d.to_string()),
                backend: self.id.clone(),
            })
            .collect();
        self.client = Some(client);
        self.last_error = None;
        tracing::info!(backend = %self.id, tools = self.tools.len(), "mcp backend connected");
        Ok(())
    }

    /// Close the client, then terminate the server.
    pub async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.cancel().await {
                tracing::debug!(backend = %self.id, error = %e, "mcp shutdown was not clean");
            }
        }
        self.tools.clear();
    }

    /// Forward a tool call to the server.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, McpError> {
        let Some(client) = self.client.as_ref() else {
            return Err(McpError::NotConnected(self.id.clone()));
        };
        let result = client
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: arguments.as_object().cloned(),
            })
            .await;
        match result {
            Ok(result) => Ok(result),
            Err(e) => {
                // A transport failure means the server is gone; drop the
                // client so the manager scrubs our tools from the router.
                let message = e.to_string();
                self.client = None;
                self.tools.clear();
                Err(self.record_error(McpError::CallFailed(name.to_string(), message)))
            }
        }
    }

    fn record_error(&mut self, error: McpError) -> McpError {
        self.last_error = Some(error.to_string());
        error
    }
}
