//! Store lifecycle events and the in-process subscriber list they are
//! delivered through.
//!
//! Handlers run synchronously on the publishing thread, in subscription order.
//! They must stay short; anything heavy belongs on an executor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The attached store is about to be swapped, e.g. on account change.
    StoresWillChange,
    /// A new store is attached and ready.
    StoresDidChange,
    /// The sync provider merged remote edits into the attached store.
    DidImportRemoteChanges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(LifecycleEvent) + Send + Sync>;

#[derive(Default)]
pub struct LifecycleNotifier {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, Handler)>>,
}

impl LifecycleNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(LifecycleEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((id, Arc::new(handler)));
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|p| p.into_inner());
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Delivers `event` to every current subscriber. The list is snapshotted
    /// first so a handler may subscribe or unsubscribe without deadlocking.
    pub fn publish(&self, event: LifecycleEvent) {
        let handlers: Vec<Handler> = self
            .subscribers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        tracing::debug!(?event, subscribers = handlers.len(), "publishing lifecycle event");
        for handler in handlers {
            handler(event);
        }
    }
}
