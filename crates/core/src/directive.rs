// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Post-step directives emitted by agents
//!
//! An agent ends its turn by optionally writing a `directive.json` next to
//! its workspace, or by closing its final message with a fenced JSON block.
//! Either way the payload decodes into this sum type.

use crate::id::AgentId;
use serde::{Deserialize, Serialize};

/// Rewind request carried by a `loop` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopDirective {
    pub steps_back: usize,
    /// Agent ids that must not re-execute during the re-traversal.
    #[serde(default)]
    pub skip_list: Vec<AgentId>,
    /// Iteration cap requested by the directive itself. The step's declared
    /// loop behavior wins when both are present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// What the just-finished agent asked the workflow to do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Directive {
    Continue,
    Loop(LoopDirective),
    Checkpoint {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Trigger {
        trigger_agent_id: AgentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Error {
        reason: String,
    },
    Stop {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Pause {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl Directive {
    /// Higher wins when a single step produces more than one action:
    /// error > stop > trigger > checkpoint > loop > pause > continue.
    pub fn precedence(&self) -> u8 {
        match self {
            Directive::Error { .. } => 6,
            Directive::Stop { .. } => 5,
            Directive::Trigger { .. } => 4,
            Directive::Checkpoint { .. } => 3,
            Directive::Loop(_) => 2,
            Directive::Pause { .. } => 1,
            Directive::Continue => 0,
        }
    }

    /// Decode the on-disk / in-stream directive payload.
    ///
    /// The wire format is flat (`{"action": "loop", "stepsBack": 2, ...}`
    /// with camelCase field names). Unknown actions decode to `Continue` so a
    /// misbehaving agent cannot wedge the workflow; the caller logs the
    /// preserved payload at debug level.
    pub fn from_payload(value: &serde_json::Value) -> Option<Directive> {
        let action = value.get("action")?.as_str()?;
        let reason = value
            .get("reason")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        match action {
            "continue" => Some(Directive::Continue),
            "loop" => {
                let steps_back = value.get("stepsBack").and_then(|v| v.as_u64())? as usize;
                let skip_list = value
                    .get("skipList")
                    .and_then(|v| v.as_array())
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|v| v.as_str())
                            .map(AgentId::from)
                            .collect()
                    })
                    .unwrap_or_default();
                let max_iterations = value
                    .get("maxIterations")
                    .and_then(|v| v.as_u64())
                    .map(|n| n as u32);
                Some(Directive::Loop(LoopDirective {
                    steps_back,
                    skip_list,
                    max_iterations,
                    reason,
                }))
            }
            "checkpoint" => Some(Directive::Checkpoint { reason }),
            "trigger" => {
                let id = value.get("triggerAgentId").and_then(|v| v.as_str())?;
                Some(Directive::Trigger {
                    trigger_agent_id: AgentId::from(id),
                    reason,
                })
            }
            "error" => Some(Directive::Error {
                reason: reason.unwrap_or_else(|| "agent reported an error".to_string()),
            }),
            "stop" => Some(Directive::Stop { reason }),
            "pause" => Some(Directive::Pause { reason }),
            _ => Some(Directive::Continue),
        }
    }
}

#[cfg(test)]
#[path = "directive_tests.rs"]
mod tests;
