//! Sync orchestrator: drains the offline queue through the registered senders.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::events::{ListenerId, Listeners, SyncEvent};
use super::sender::SenderRegistry;
use crate::connectivity::{ConnectivityMonitor, Subscription};
use crate::models::{QueueItem, QueueStats};
use crate::queue::QueueManager;
use crate::util::unix_millis_now;

const OFFLINE_REASON: &str = "Device is offline";
const BUSY_REASON: &str = "Sync already in progress";

/// Result of one `sync_now` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// `false` when the pass could not run at all
    pub success: bool,
    pub synced: usize,
    pub failed: usize,
    /// Why the pass did not run, or the last dispatch error it saw
    pub error: Option<String>,
}

impl SyncOutcome {
    fn skipped(reason: &str) -> Self {
        Self {
            success: false,
            error: Some(reason.to_string()),
            ..Self::default()
        }
    }
}

/// Snapshot of orchestrator and queue state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub is_running: bool,
    pub is_syncing: bool,
    pub is_online: bool,
    pub last_sync_at: Option<i64>,
    pub last_outcome: Option<SyncOutcome>,
    pub queue: QueueStats,
}

/// Coordinates sync passes over a [`QueueManager`].
///
/// Cheap to clone; clones share the same queue, listeners and sync slot.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    queue: QueueManager,
    monitor: ConnectivityMonitor,
    senders: SenderRegistry,
    listeners: Listeners,
    syncing: AtomicBool,
    service: Mutex<Option<Service>>,
    last: Mutex<Option<(i64, SyncOutcome)>>,
}

/// Background machinery installed by `start`
struct Service {
    _subscription: Subscription,
    trigger: JoinHandle<()>,
    timer: JoinHandle<()>,
}

impl Drop for Service {
    fn drop(&mut self) {
        self.trigger.abort();
        self.timer.abort();
    }
}

/// Holds the sync slot for the duration of a pass
struct PassGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl SyncOrchestrator {
    /// Create an idle orchestrator. Call [`start`](Self::start) for
    /// automatic syncing, or drive it with [`sync_now`](Self::sync_now).
    pub fn new(queue: QueueManager, monitor: ConnectivityMonitor, senders: SenderRegistry) -> Self {
        let missing = senders.missing();
        if !missing.is_empty() {
            tracing::warn!(
                "No sender registered for: {}",
                missing
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        Self {
            inner: Arc::new(Inner {
                queue,
                monitor,
                senders,
                listeners: Listeners::new(),
                syncing: AtomicBool::new(false),
                service: Mutex::new(None),
                last: Mutex::new(None),
            }),
        }
    }

    /// Shared queue handle
    pub fn queue(&self) -> &QueueManager {
        &self.inner.queue
    }

    /// Connectivity monitor driving automatic passes
    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.inner.monitor
    }

    /// Whether `start` is in effect
    pub fn is_running(&self) -> bool {
        self.service().is_some()
    }

    /// Whether a pass is in progress
    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::Acquire)
    }

    /// Begin automatic syncing: a pass on every offline to online transition
    /// and a fallback pass each interval while online with work queued.
    ///
    /// Must be called within a tokio runtime. Calling it twice is a no-op.
    pub fn start(&self) {
        let mut service = self.service();
        if service.is_some() {
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let subscription = self.inner.monitor.subscribe(move |online| {
            if online {
                let _ = tx.send(());
            }
        });

        let weak = Arc::downgrade(&self.inner);
        let trigger = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                if !spawn_pass(&weak, "connectivity restored") {
                    break;
                }
            }
        });

        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.queue.config().sync_interval();
        let timer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let orchestrator = Self { inner };
                if orchestrator.has_work().await && orchestrator.inner.monitor.is_online() {
                    orchestrator.spawn_detached("interval");
                }
            }
        });

        *service = Some(Service {
            _subscription: subscription,
            trigger,
            timer,
        });
        drop(service);
        tracing::info!("Sync service started (interval {}s)", period.as_secs());
    }

    /// Stop automatic syncing. An in-flight pass runs to completion.
    pub fn stop(&self) {
        if self.service().take().is_some() {
            tracing::info!("Sync service stopped");
        }
    }

    /// Register an event listener
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.add(Arc::new(listener))
    }

    /// Remove a listener; returns `false` if it was not registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// Current orchestrator and queue state
    pub async fn status(&self) -> SyncStatus {
        let last = self
            .inner
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let (last_sync_at, last_outcome) = last.map_or((None, None), |(at, outcome)| {
            (Some(at), Some(outcome))
        });

        SyncStatus {
            is_running: self.is_running(),
            is_syncing: self.is_syncing(),
            is_online: self.inner.monitor.is_online(),
            last_sync_at,
            last_outcome,
            queue: self.inner.queue.stats().await,
        }
    }

    /// Run one sync pass now.
    ///
    /// Never fails: a pass that cannot run (offline, or another pass in
    /// progress) returns `success: false` and touches nothing.
    pub async fn sync_now(&self) -> SyncOutcome {
        if !self.inner.monitor.current_state().await {
            tracing::debug!("Skipping sync: offline");
            return SyncOutcome::skipped(OFFLINE_REASON);
        }

        let Some(_guard) = PassGuard::acquire(&self.inner.syncing) else {
            tracing::debug!("Skipping sync: pass already running");
            return SyncOutcome::skipped(BUSY_REASON);
        };

        self.emit(&SyncEvent::Started);
        let outcome = self.run_pass().await;

        *self
            .inner
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((unix_millis_now(), outcome.clone()));
        self.emit(&SyncEvent::Completed {
            synced: outcome.synced,
            failed: outcome.failed,
        });
        outcome
    }

    async fn run_pass(&self) -> SyncOutcome {
        let queue = &self.inner.queue;
        let config = queue.config().clone();

        if config.auto_retry_failed {
            let reset = queue.retry_failed().await;
            if reset > 0 {
                tracing::debug!("Re-queued {} failed items", reset);
            }
        }

        let mut outcome = SyncOutcome {
            success: true,
            ..SyncOutcome::default()
        };

        if queue.stats().await.pending == 0 {
            return outcome;
        }

        let batch = queue.get_batch(config.batch_size).await;
        let total = batch.len();

        for item in batch {
            // The item may have been removed or evicted since the batch was claimed.
            if !queue.mark_processing(&item.id).await {
                continue;
            }

            match self.dispatch(&item).await {
                Ok(()) => {
                    queue.mark_completed(&item.id).await;
                    outcome.synced += 1;
                    self.emit(&SyncEvent::Progress {
                        synced: outcome.synced,
                        failed: outcome.failed,
                        total,
                    });
                }
                Err(message) => {
                    queue.mark_failed(&item.id, message.clone()).await;
                    outcome.failed += 1;
                    outcome.error = Some(message);

                    let exhausted = queue
                        .get_item(&item.id)
                        .await
                        .is_some_and(|current| current.has_exhausted_retries(config.max_retries));
                    if exhausted && queue.remove_item(&item.id).await {
                        tracing::warn!(
                            "Dropping {} item {} after {} failed attempts",
                            item.operation_type,
                            item.id,
                            config.max_retries
                        );
                    }
                }
            }
        }

        queue.clear_completed(config.completed_retention_days).await;

        tracing::info!(
            "Sync pass finished: {} synced, {} failed of {}",
            outcome.synced,
            outcome.failed,
            total
        );
        outcome
    }

    async fn dispatch(&self, item: &QueueItem) -> Result<(), String> {
        let Some(sender) = self.inner.senders.get(item.operation_type) else {
            let message = format!("No sender registered for {}", item.operation_type);
            tracing::warn!("{}", message);
            self.emit(&SyncEvent::Error {
                message: message.clone(),
            });
            return Err(message);
        };

        // A sender may panic while building its future as well as while polling it.
        let attempt =
            match std::panic::catch_unwind(AssertUnwindSafe(|| sender.send(&item.payload))) {
                Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
                Err(panic) => Err(panic),
            };

        match attempt {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => {
                tracing::debug!("Send of {} {} failed: {}", item.operation_type, item.id, error);
                Err(error.to_string())
            }
            Err(_) => {
                let message = format!("Sender for {} panicked", item.operation_type);
                tracing::error!("{} while sending {}", message, item.id);
                self.emit(&SyncEvent::Error {
                    message: message.clone(),
                });
                Err(message)
            }
        }
    }

    async fn has_work(&self) -> bool {
        let stats = self.inner.queue.stats().await;
        stats.pending > 0 || (self.inner.queue.config().auto_retry_failed && stats.failed > 0)
    }

    fn spawn_detached(&self, reason: &'static str) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            tracing::debug!("Triggering sync ({})", reason);
            orchestrator.sync_now().await;
        });
    }

    fn emit(&self, event: &SyncEvent) {
        self.inner.listeners.emit(event);
    }

    fn service(&self) -> std::sync::MutexGuard<'_, Option<Service>> {
        self.inner
            .service
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Spawn a pass if the orchestrator is still alive; returns `false` once it
/// has been dropped.
fn spawn_pass(weak: &Weak<Inner>, reason: &'static str) -> bool {
    let Some(inner) = weak.upgrade() else {
        return false;
    };
    SyncOrchestrator { inner }.spawn_detached(reason);
    true
}
