//! Notifications from the monitoring session to the UI layer.
//!
//! The session publishes queue changes and the poller task publishes progress,
//! both onto one `EventBus`. Listeners register a closure and keep the returned
//! `Subscription` alive for as long as they want to hear about changes.

use crate::backend::Transfer;
use queue_content::{InternalOp, RootSnapshot};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// What changed in the monitored queue.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum SessionEvent {
    /// The node tree changed; carries a fresh snapshot.
    NodeOpsChanged(Vec<RootSnapshot>),
    /// The internal operations log changed; carries the whole log.
    InternalOpsChanged(Vec<InternalOp>),
    /// Latest progress of in-flight uploads and downloads.
    Transfers(Vec<Transfer>),
}

type Listener = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Keeps a listener registered; dropping it removes the listener.
#[must_use = "the listener is removed as soon as the subscription is dropped"]
pub struct Subscription {
    bus: Weak<EventBus>,
    key: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            // Freed after the guard: the listener may own subscriptions of its own.
            let removed = bus.lock().by_key.remove(&self.key);
            drop(removed);
        }
    }
}

#[derive(Default)]
struct Listeners {
    next_key: u64,
    by_key: BTreeMap<u64, Listener>,
}

/// Fan-out of `SessionEvent`s, in subscription order.
///
/// Subscribing needs the bus behind an `Arc` so the handle can find it again.
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<Listeners>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        self: &Arc<Self>,
        listener: impl Fn(SessionEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = self.lock();
        let key = inner.next_key;
        inner.next_key += 1;
        inner.by_key.insert(key, Arc::new(listener));
        Subscription {
            bus: Arc::downgrade(self),
            key,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().by_key.len()
    }

    /// Call every listener registered at the time of the call.
    ///
    /// The lock is released before any listener runs, so listeners are free
    /// to subscribe or drop subscriptions.
    pub fn emit(&self, event: SessionEvent) {
        let listeners: Vec<Listener> = self.lock().by_key.values().cloned().collect();
        for listener in listeners {
            listener(event.clone());
        }
    }

    fn lock(&self) -> MutexGuard<'_, Listeners> {
        // Listeners never run under the lock, so a poisoned one holds consistent data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
