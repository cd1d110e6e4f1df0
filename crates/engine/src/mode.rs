// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow mode: who produces the next input
//!
//! Derived rule: the user provider is active when `paused || !auto`, else
//! the controller provider. The active provider is always computed from
//! state, never stored. Every transition performs exactly one deactivate
//! then exactly one activate, and the outgoing provider's pending wait is
//! aborted so nothing dangles.

use crate::emitter::Emitter;
use crate::input::InputProvider;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ModeState {
    auto: bool,
    paused: bool,
}

impl ModeState {
    fn user_active(self) -> bool {
        self.paused || !self.auto
    }
}

/// Owns the auto/paused flags and the two providers.
pub struct ModeManager {
    state: Mutex<ModeState>,
    user: Arc<dyn InputProvider>,
    controller: Arc<dyn InputProvider>,
    emitter: Emitter,
}

impl ModeManager {
    pub fn new(
        user: Arc<dyn InputProvider>,
        controller: Arc<dyn InputProvider>,
        emitter: Emitter,
        auto: bool,
    ) -> Self {
        let manager = Self {
            state: Mutex::new(ModeState {
                auto,
                paused: false,
            }),
            user,
            controller,
            emitter,
        };
        manager.provider_for(manager.snapshot()).activate();
        manager
    }

    fn snapshot(&self) -> ModeState {
        *self.state.lock()
    }

    fn provider_for(&self, state: ModeState) -> &Arc<dyn InputProvider> {
        if state.user_active() {
            &self.user
        } else {
            &self.controller
        }
    }

    pub fn is_auto(&self) -> bool {
        self.snapshot().auto
    }

    pub fn is_paused(&self) -> bool {
        self.snapshot().paused
    }

    /// The provider that should answer the next input request.
    pub fn active_provider(&self) -> Arc<dyn InputProvider> {
        Arc::clone(self.provider_for(self.snapshot()))
    }

    /// Flip autonomy. Turning auto on also clears `paused`. Emits a
    /// mode-changed event only when the auto flag actually changes, so
    /// repeated calls are idempotent.
    pub fn set_auto_mode(&self, auto: bool) {
        let (old_state, new_state) = {
            let mut state = self.state.lock();
            let old = *state;
            state.auto = auto;
            if auto {
                state.paused = false;
            }
            (old, *state)
        };
        self.swap_providers(old_state, new_state);
        if old_state.auto != new_state.auto {
            self.emitter.mode_changed(new_state.auto);
        }
    }

    /// Pause: drops out of auto and pins the user provider.
    pub fn pause(&self) {
        let (old_state, new_state) = {
            let mut state = self.state.lock();
            let old = *state;
            state.paused = true;
            state.auto = false;
            (old, *state)
        };
        self.swap_providers(old_state, new_state);
        if old_state.auto != new_state.auto {
            self.emitter.mode_changed(new_state.auto);
        }
    }

    /// Resume from pause; if auto was re-enabled meanwhile the controller
    /// becomes active again.
    pub fn resume(&self) {
        let (old_state, new_state) = {
            let mut state = self.state.lock();
            let old = *state;
            state.paused = false;
            (old, *state)
        };
        self.swap_providers(old_state, new_state);
    }

    fn swap_providers(&self, old_state: ModeState, new_state: ModeState) {
        if old_state.user_active() == new_state.user_active() {
            return;
        }
        let outgoing = self.provider_for(old_state);
        let incoming = self.provider_for(new_state);
        // No provider may be left with a pending get_input after
        // deactivation.
        outgoing.abort();
        outgoing.deactivate();
        incoming.activate();
    }
}

#[cfg(test)]
#[path = "mode_tests.rs"]
mod tests;
