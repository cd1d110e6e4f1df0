// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Autonomy mode vocabulary shared by templates and persisted tracking

use serde::{Deserialize, Serialize};

/// Autonomy default declared by a template and persisted in tracking.
///
/// `Never` pins the workflow to user input; `Always` pins it to the
/// controller; `True`/`False` set the initial mode but allow live switching.
/// Persists as one of the four literal strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutonomousMode {
    True,
    #[default]
    False,
    Never,
    Always,
}

impl AutonomousMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AutonomousMode::True => "true",
            AutonomousMode::False => "false",
            AutonomousMode::Never => "never",
            AutonomousMode::Always => "always",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "true" => Some(AutonomousMode::True),
            "false" => Some(AutonomousMode::False),
            "never" => Some(AutonomousMode::Never),
            "always" => Some(AutonomousMode::Always),
            _ => None,
        }
    }

    /// Whether the controller drives the workflow initially.
    pub fn starts_auto(self) -> bool {
        matches!(self, AutonomousMode::True | AutonomousMode::Always)
    }
}

impl Serialize for AutonomousMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AutonomousMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AutonomousMode::parse(&s).ok_or_else(|| {
            serde::de::Error::unknown_variant(&s, &["true", "false", "never", "always"])
        })
    }
}

#[cfg(test)]
#[path = "mode_tests.rs"]
mod tests;
