//! Watcher registry and subscription handles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::traits::WatchCallback;

/// Ordered set of watchers. Subscription order is notification order.
pub(crate) struct WatcherRegistry<S> {
    next_id: AtomicU64,
    watchers: Mutex<Vec<(u64, WatchCallback<S>)>>,
}

impl<S: Send + Sync + 'static> WatcherRegistry<S> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            watchers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(self: &Arc<Self>, callback: WatchCallback<S>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, callback));

        let registry: Weak<Self> = Arc::downgrade(self);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.remove(id);
                }
            })),
        }
    }

    fn remove(&self, id: u64) {
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(watcher_id, _)| *watcher_id != id);
    }

    /// Watchers registered right now. The lock is released before any
    /// watcher runs, so watchers may subscribe or unsubscribe freely.
    pub fn snapshot(&self) -> Vec<WatchCallback<S>> {
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle returned by [`Store::watch`](crate::Store::watch).
///
/// Dropping the handle keeps the watcher registered.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Stop notifying this watcher. Calling it again does nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }

    pub fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
