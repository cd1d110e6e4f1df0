// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-assigned session identifiers

crate::define_id! {
    /// Identifier an engine assigns to a conversation, used to resume it.
    ///
    /// Opaque to the orchestrator; the empty string means "no session yet"
    /// in persisted tracking data.
    pub struct SessionId;
}

impl SessionId {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
