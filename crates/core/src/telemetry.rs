// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry parsed from engine output streams

use serde::{Deserialize, Serialize};

/// Cumulative usage numbers for one agent run.
///
/// Engines report running totals, so each update overwrites the previous
/// snapshot rather than adding to it. `tokens_in` includes cached tokens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    #[serde(default)]
    pub tokens_in: u64,
    #[serde(default)]
    pub tokens_out: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Wall-clock duration reported by the engine, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Telemetry {
    /// True when no engine update has been applied yet.
    pub fn is_empty(&self) -> bool {
        *self == Telemetry::default()
    }

    /// Replace this snapshot with a newer cumulative one, keeping fields the
    /// newer snapshot does not carry.
    pub fn apply(&mut self, update: &Telemetry) {
        self.tokens_in = update.tokens_in;
        self.tokens_out = update.tokens_out;
        if update.cached.is_some() {
            self.cached = update.cached;
        }
        if update.cost.is_some() {
            self.cost = update.cost;
        }
        if update.duration_ms.is_some() {
            self.duration_ms = update.duration_ms;
        }
    }
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
