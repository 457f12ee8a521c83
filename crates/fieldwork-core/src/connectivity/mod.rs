//! Network reachability tracking.
//!
//! Platforms either push reachability changes ([`ConnectivityMonitor::report`])
//! or are polled through a [`ReachabilityProbe`]. Both paths collapse into one
//! boolean; subscribers only hear about actual changes, never repeats.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinHandle;

/// Source of a fresh reachability reading
pub trait ReachabilityProbe: Send + Sync {
    /// Returns `true` when the backend is currently reachable
    fn check(&self) -> BoxFuture<'_, bool>;
}

/// Probe whose answer is set explicitly.
#[derive(Debug, Default)]
pub struct ManualProbe {
    online: AtomicBool,
}

impl ManualProbe {
    /// Create a probe reporting `online`
    pub const fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Change the answer returned by subsequent checks
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl ReachabilityProbe for ManualProbe {
    fn check(&self) -> BoxFuture<'_, bool> {
        let online = self.online.load(Ordering::SeqCst);
        async move { online }.boxed()
    }
}

type Callback = Arc<dyn Fn(bool) + Send + Sync>;

/// Shared online/offline state with change subscriptions.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    probe: Option<Arc<dyn ReachabilityProbe>>,
    online: AtomicBool,
    subscribers: Mutex<Vec<(u64, Callback)>>,
    next_id: AtomicU64,
}

impl ConnectivityMonitor {
    /// Monitor fed only by [`report`](Self::report)
    pub fn new(initially_online: bool) -> Self {
        Self::build(None, initially_online)
    }

    /// Monitor that reads fresh state from `probe`. Starts offline until the
    /// first reading, so the first successful probe counts as a transition.
    pub fn with_probe(probe: Arc<dyn ReachabilityProbe>) -> Self {
        Self::build(Some(probe), false)
    }

    fn build(probe: Option<Arc<dyn ReachabilityProbe>>, online: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                probe,
                online: AtomicBool::new(online),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Last known state, without probing
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Fresh reading from the probe (or the last reported state when the
    /// platform only pushes). A changed reading notifies subscribers.
    pub async fn current_state(&self) -> bool {
        let Some(probe) = self.inner.probe.clone() else {
            return self.is_online();
        };
        let online = probe.check().await;
        self.report(online);
        online
    }

    /// Record a platform reachability signal.
    ///
    /// Returns `true` when the state changed and subscribers were notified.
    pub fn report(&self, online: bool) -> bool {
        let previous = self.inner.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }

        tracing::info!(
            "Connectivity changed: {}",
            if online { "online" } else { "offline" }
        );
        self.notify(online);
        true
    }

    /// Invoke `callback` with the new state on every change.
    ///
    /// The subscription ends when the returned handle is dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));

        Subscription {
            id,
            monitor: Arc::downgrade(&self.inner),
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Probe every `interval` in the background until the returned handle is
    /// stopped or dropped.
    pub fn spawn_poller(&self, interval: Duration) -> Poller {
        let monitor = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.current_state().await;
            }
        });
        Poller { handle }
    }

    fn notify(&self, online: bool) {
        let callbacks = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect::<Vec<_>>();

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(online))).is_err() {
                tracing::error!("Connectivity subscriber panicked; continuing");
            }
        }
    }
}

/// Handle keeping a connectivity subscription alive
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    monitor: Weak<Inner>,
}

impl Subscription {
    /// Stop receiving notifications
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.monitor.upgrade() {
            inner
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// Background reachability polling task
pub struct Poller {
    handle: JoinHandle<()>,
}

impl Poller {
    /// Stop polling
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
