// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal-user input provider

use super::{InputContext, InputError, InputProvider, InputResult, InputSource, SWITCH_TO_AUTO};
use crate::control::{ControlChannel, ControlMessage, SignalKind};
use crate::emitter::Emitter;
use cm_adapters::AbortHandle;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;

/// Listens on the control channel for the user's next turn.
///
/// Resolution rules: `skip` → Skip; empty prompt with queue remaining →
/// the next queued prompt; empty with no queue → empty input ("advance");
/// anything else → the typed prompt. A mode-change-to-auto signal resolves
/// with the [`SWITCH_TO_AUTO`] sentinel so the outer loop can swap
/// providers.
pub struct UserInputProvider {
    control: ControlChannel,
    emitter: Emitter,
    pending: Mutex<Option<AbortHandle>>,
}

impl UserInputProvider {
    pub fn new(control: ControlChannel, emitter: Emitter) -> Self {
        Self {
            control,
            emitter,
            pending: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl InputProvider for UserInputProvider {
    fn id(&self) -> &str {
        "user"
    }

    async fn get_input(&self, ctx: InputContext<'_>) -> Result<InputResult, InputError> {
        let handle = AbortHandle::new();
        let signal = handle.signal();
        *self.pending.lock() = Some(handle);

        self.emitter.input_waiting();
        let mut rx = self.control.subscribe();

        let result = loop {
            tokio::select! {
                () = signal.cancelled() => break Err(InputError::Aborted),
                received = rx.recv() => match received {
                    Ok(ControlMessage::Input { skip: true, .. }) => break Ok(InputResult::Skip),
                    Ok(ControlMessage::Input { prompt, .. }) => {
                        let prompt = prompt.unwrap_or_default();
                        if prompt.is_empty() {
                            if ctx.queue_index < ctx.queue.len() {
                                self.emitter.input_received(InputSource::Queue.as_str());
                                break Ok(InputResult::Input {
                                    value: ctx.queue[ctx.queue_index].clone(),
                                    resume_monitoring_id: None,
                                    source: InputSource::Queue,
                                });
                            }
                            // Empty with no queue: signal "advance".
                            break Ok(InputResult::Input {
                                value: String::new(),
                                resume_monitoring_id: None,
                                source: InputSource::User,
                            });
                        }
                        self.emitter.input_received(InputSource::User.as_str());
                        break Ok(InputResult::Input {
                            value: prompt,
                            resume_monitoring_id: None,
                            source: InputSource::User,
                        });
                    }
                    Ok(ControlMessage::Signal(SignalKind::ModeChange { auto_mode: true })) => {
                        break Ok(InputResult::Input {
                            value: SWITCH_TO_AUTO.to_string(),
                            resume_monitoring_id: None,
                            source: InputSource::User,
                        });
                    }
                    Ok(ControlMessage::Signal(SignalKind::Stop)) => break Ok(InputResult::Stop),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break Err(InputError::ChannelClosed),
                },
            }
        };

        *self.pending.lock() = None;
        result
    }

    fn abort(&self) {
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "user_tests.rs"]
mod tests;
