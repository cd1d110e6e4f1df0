// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier types for agents, engines, and monitor entries

use serde::{Deserialize, Serialize};

/// Trait for truncating identifiers to a short prefix.
pub trait ShortId {
    /// Returns a string slice truncated to at most `n` characters.
    fn short(&self, n: usize) -> &str;
}

impl ShortId for str {
    fn short(&self, n: usize) -> &str {
        if self.len() <= n {
            self
        } else {
            &self[..n]
        }
    }
}

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `short()`, `Display`, `From<String>`,
/// `From<&str>`, `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>`
/// implementations. Extra derives (e.g. `Default`) can be passed as
/// attributes on the struct.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns a string slice truncated to at most `n` characters.
            pub fn short(&self, n: usize) -> &str {
                if self.0.len() <= n {
                    &self.0
                } else {
                    &self.0[..n]
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Stable identifier of an agent definition in the manifest.
    ///
    /// Distinct from [`MonitoringId`]: one agent definition may be run many
    /// times, each run getting its own monitor entry.
    #[derive(Default)]
    pub struct AgentId;
}

define_id! {
    /// Identifier of an engine adapter (e.g. `claude`, `codex`).
    pub struct EngineId;
}

/// Integer identity of one agent run inside the monitor.
///
/// Assigned by auto-increment; parent/child edges between agent runs are
/// expressed as `MonitoringId` references, never back-pointers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct MonitoringId(pub u64);

impl MonitoringId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MonitoringId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MonitoringId {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

/// Stable per-step identity: `"{agent_id}-step-{step_index}"`.
///
/// This is the single definition of the format; everything that needs the
/// unique agent id of a step goes through here.
pub fn unique_agent_id(agent_id: &AgentId, step_index: usize) -> String {
    format!("{}-step-{}", agent_id, step_index)
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
