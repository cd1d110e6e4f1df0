// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MCP backend configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How to launch one stdio MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// One entry in the active-servers list an agent is granted.
///
/// `only` wins over `exclude` when both are present. An empty active list
/// grants no tools at all — tool access is opt-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveServer {
    pub server: String,
    #[serde(default)]
    pub only: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
}

impl ActiveServer {
    pub fn all(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            only: None,
            exclude: None,
        }
    }
}
