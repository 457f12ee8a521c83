//! Sync pass notifications.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Emitted by the orchestrator while a pass runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A pass acquired the sync slot and is about to run
    Started,
    /// One item in the batch was delivered
    Progress {
        synced: usize,
        failed: usize,
        total: usize,
    },
    /// The pass finished
    Completed { synced: usize, failed: usize },
    /// A dispatch failed in a way the caller should hear about
    Error { message: String },
}

/// Handle returned by `add_listener`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Registered event listeners. A panicking listener is logged and skipped.
pub(crate) struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Listener)>>,
}

impl Listeners {
    pub(crate) const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.lock().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub(crate) fn emit(&self, event: &SyncEvent) {
        // Snapshot so listeners may add or remove listeners themselves.
        let listeners = self
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect::<Vec<_>>();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::error!("Sync listener panicked on {:?}", event);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_listeners_in_registration_order() {
        let listeners = Listeners::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second"] {
            let sink = Arc::clone(&seen);
            listeners.add(Arc::new(move |event: &SyncEvent| {
                sink.lock().unwrap().push((name, event.clone()));
            }));
        }

        listeners.emit(&SyncEvent::Started);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", SyncEvent::Started), ("second", SyncEvent::Started)]
        );
    }

    #[test]
    fn test_remove_unknown_listener_is_noop() {
        let listeners = Listeners::new();
        let id = listeners.add(Arc::new(|_: &SyncEvent| {}));

        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let listeners = Listeners::new();
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);

        listeners.add(Arc::new(|_: &SyncEvent| panic!("listener bug")));
        listeners.add(Arc::new(move |_: &SyncEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        listeners.emit(&SyncEvent::Completed {
            synced: 0,
            failed: 0,
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
