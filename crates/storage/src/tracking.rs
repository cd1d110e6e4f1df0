// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk `template.json` schema

use cm_core::{AgentId, AutonomousMode, MonitoringId, SessionId};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from reading or writing tracking state.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("failed to access template.json: {0}")]
    Io(#[from] std::io::Error),

    #[error("template.json is not valid tracking data: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted per-step state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepData {
    /// Empty string means "no session yet".
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub monitoring_id: u64,
    /// Present only while a chained-prompt step is mid-flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_chains: Option<Vec<usize>>,
    /// Presence means "fully done".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl StepData {
    pub fn session(&self) -> Option<SessionId> {
        if self.session_id.is_empty() {
            None
        } else {
            Some(SessionId::new(self.session_id.clone()))
        }
    }

    pub fn monitoring(&self) -> MonitoringId {
        MonitoringId(self.monitoring_id)
    }
}

/// Persisted controller session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    pub agent_id: AgentId,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub monitoring_id: u64,
}

fn default_true() -> bool {
    true
}

/// The whole `template.json` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateTracking {
    #[serde(default)]
    pub active_template: String,
    /// ISO 8601; refreshed on every write.
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub autonomous_mode: AutonomousMode,
    #[serde(default = "default_true")]
    pub resume_from_last_step: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_config: Option<ControllerConfig>,
    /// Keyed by stringified step index in JSON.
    #[serde(default, deserialize_with = "completed_steps_compat")]
    pub completed_steps: BTreeMap<usize, StepData>,
    /// Steps that started and did not finish, sorted ascending.
    #[serde(default)]
    pub not_completed_steps: Vec<usize>,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub selected_track: String,
    #[serde(default)]
    pub selected_conditions: Vec<String>,
}

/// Back-compat: `completedSteps` used to be a plain array of indices.
/// Each legacy element migrates to an empty-session [`StepData`] stamped
/// completed now.
fn completed_steps_compat<'de, D>(deserializer: D) -> Result<BTreeMap<usize, StepData>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Map(BTreeMap<String, StepData>),
        Legacy(Vec<usize>),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Map(map) => {
            let mut steps = BTreeMap::new();
            for (key, value) in map {
                let index: usize = key.parse().map_err(serde::de::Error::custom)?;
                steps.insert(index, value);
            }
            Ok(steps)
        }
        Raw::Legacy(indices) => {
            let now = chrono::Utc::now().to_rfc3339();
            Ok(indices
                .into_iter()
                .map(|index| {
                    (
                        index,
                        StepData {
                            session_id: String::new(),
                            monitoring_id: 0,
                            completed_chains: None,
                            completed_at: Some(now.clone()),
                        },
                    )
                })
                .collect())
        }
    }
}

impl TemplateTracking {
    pub fn new(active_template: impl Into<String>) -> Self {
        Self {
            active_template: active_template.into(),
            resume_from_last_step: true,
            ..Default::default()
        }
    }

    /// Value for a context placeholder, or None if the name is not a
    /// context builtin.
    pub fn context_value(&self, name: &str) -> Option<String> {
        match name {
            "project_name" => Some(self.project_name.clone()),
            "selected_track" => Some(self.selected_track.clone()),
            "selected_conditions" => Some(self.selected_conditions.join(", ")),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "tracking_tests.rs"]
mod tests;
