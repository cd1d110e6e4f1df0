// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound control channel
//!
//! The event bus carries engine → UI traffic; this channel carries the
//! reverse direction: free-form input, checkpoint resolutions, and
//! interrupt signals. Broadcast so the signal dispatcher and the active
//! input provider each see every message.

use tokio::sync::broadcast;

/// Resolution of a checkpoint prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointDecision {
    Continue,
    Quit,
}

/// Interrupt signals a user (or UI) can send mid-run.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalKind {
    Pause,
    Skip,
    Stop,
    ModeChange { auto_mode: bool },
}

/// Messages flowing into the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// A user-style turn: `prompt == None` or empty means "advance".
    Input {
        prompt: Option<String>,
        skip: bool,
    },
    CheckpointResolution { decision: CheckpointDecision },
    Signal(SignalKind),
}

/// Cloneable handle to the control broadcast.
#[derive(Clone)]
pub struct ControlChannel {
    tx: broadcast::Sender<ControlMessage>,
}

impl Default for ControlChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Send a message; silently dropped when nothing is listening.
    pub fn send(&self, message: ControlMessage) {
        let _ = self.tx.send(message);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlMessage> {
        self.tx.subscribe()
    }
}
