// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed pub/sub event bus
//!
//! Subscribers are snapshotted before delivery, so a listener may
//! subscribe or unsubscribe from inside a callback without deadlocking.
//! A panicking listener never cancels delivery to the rest.

use cm_core::{Event, EventKind};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Handle for removing a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

struct TypedListener {
    id: u64,
    listener: Listener,
    once: bool,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    all: Vec<(u64, Listener)>,
    typed: HashMap<EventKind, Vec<TypedListener>>,
    history: VecDeque<Event>,
}

/// Historied, typed pub/sub.
pub struct EventBus {
    inner: Mutex<BusInner>,
    history_cap: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_history_capacity(1000)
    }

    /// `history_cap == 0` disables history recording.
    pub fn with_history_capacity(history_cap: usize) -> Self {
        Self {
            inner: Mutex::new(BusInner::default()),
            history_cap,
        }
    }

    /// Subscribe to every event.
    pub fn subscribe(&self, listener: impl Fn(&Event) + Send + Sync + 'static) -> SubscriptionId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.all.push((id, Arc::new(listener)));
        SubscriptionId(id)
    }

    /// Subscribe to one event kind.
    pub fn on(
        &self,
        kind: EventKind,
        listener: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.add_typed(kind, Arc::new(listener), false)
    }

    /// Subscribe to one event kind for a single delivery.
    pub fn once(
        &self,
        kind: EventKind,
        listener: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.add_typed(kind, Arc::new(listener), true)
    }

    fn add_typed(&self, kind: EventKind, listener: Listener, once: bool) -> SubscriptionId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .typed
            .entry(kind)
            .or_default()
            .push(TypedListener { id, listener, once });
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock();
        inner.all.retain(|(i, _)| *i != id.0);
        for listeners in inner.typed.values_mut() {
            listeners.retain(|l| l.id != id.0);
        }
    }

    /// Fan out to all general subscribers and to subscribers of the event's
    /// kind.
    pub fn emit(&self, event: Event) {
        let (general, typed) = {
            let mut inner = self.inner.lock();
            if self.history_cap > 0 {
                if inner.history.len() == self.history_cap {
                    inner.history.pop_front();
                }
                inner.history.push_back(event.clone());
            }
            let general: Vec<Listener> =
                inner.all.iter().map(|(_, l)| Arc::clone(l)).collect();
            let kind = event.kind();
            let typed: Vec<Listener> = match inner.typed.get_mut(&kind) {
                Some(listeners) => {
                    let snapshot = listeners
                        .iter()
                        .map(|l| Arc::clone(&l.listener))
                        .collect();
                    listeners.retain(|l| !l.once);
                    snapshot
                }
                None => Vec::new(),
            };
            (general, typed)
        };

        for listener in general.iter().chain(typed.iter()) {
            deliver(listener, &event);
        }
    }

    /// A future resolving with the next event of `kind`.
    pub fn wait_for(&self, kind: EventKind) -> tokio::sync::oneshot::Receiver<Event> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Mutex::new(Some(tx));
        self.once(kind, move |event| {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(event.clone());
            }
        });
        rx
    }

    pub fn history(&self) -> Vec<Event> {
        self.inner.lock().history.iter().cloned().collect()
    }

    pub fn history_by_kind(&self, kind: EventKind) -> Vec<Event> {
        self.inner
            .lock()
            .history
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }
}

fn deliver(listener: &Listener, event: &Event) {
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| listener(event)));
    if result.is_err() {
        tracing::warn!(kind = ?event.kind(), "event listener panicked, continuing delivery");
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
