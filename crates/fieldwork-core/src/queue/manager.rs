//! Queue manager: the only writer of the offline queue.
//!
//! Every mutation takes the item-list lock, applies the change in memory and
//! persists the whole list before releasing it. The in-memory list is
//! authoritative; a failed save is logged and retried implicitly by the next
//! successful one.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::models::{OperationType, QueueItem, QueueItemId, QueueStats, QueueStatus};
use crate::storage::KeyValueStore;
use crate::util::{days_to_millis, unix_millis_now};

use super::QueueStore;

const INTERRUPTED_ERROR: &str = "interrupted before completion";

/// Shared handle to the offline queue.
#[derive(Clone)]
pub struct QueueManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: QueueStore,
    items: Mutex<Vec<QueueItem>>,
    config: SyncConfig,
}

impl QueueManager {
    /// Open the queue persisted in `kv`.
    ///
    /// Items left `Processing` by an interrupted pass are marked `Failed`
    /// (charging one retry) so the normal retry path picks them up again.
    /// `Failed` items with no retries left are dropped.
    pub async fn open(kv: Arc<dyn KeyValueStore>, config: SyncConfig) -> Result<Self> {
        config.validate()?;
        let store = QueueStore::new(kv, config.storage_key.clone());
        let mut items = store.load().await;

        let now = unix_millis_now();
        let mut changed = 0usize;
        for item in items
            .iter_mut()
            .filter(|item| item.status == QueueStatus::Processing)
        {
            item.status = QueueStatus::Failed;
            item.retry_count = item.retry_count.saturating_add(1);
            item.last_error = Some(INTERRUPTED_ERROR.to_string());
            item.last_attempt_at = Some(now);
            changed += 1;
        }
        if changed > 0 {
            tracing::warn!("Recovered {changed} queue items interrupted mid-send");
        }

        let before = items.len();
        items.retain(|item| {
            !(item.status == QueueStatus::Failed && item.has_exhausted_retries(config.max_retries))
        });
        let dropped = before - items.len();
        if dropped > 0 {
            tracing::warn!("Dropped {dropped} queue items with no retries left");
        }

        let evicted = evict_to(&mut items, config.capacity);
        if evicted > 0 {
            tracing::info!(
                "Evicted {evicted} queue items to fit capacity {}",
                config.capacity
            );
        }

        let manager = Self {
            inner: Arc::new(Inner {
                store,
                items: Mutex::new(Vec::new()),
                config,
            }),
        };

        {
            let mut guard = manager.inner.items.lock().await;
            *guard = items;
            if changed + dropped + evicted > 0 {
                manager.persist(&guard).await;
            }
            tracing::debug!("Opened offline queue with {} items", guard.len());
        }

        Ok(manager)
    }

    /// Configuration this queue was opened with
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Append a new `Pending` item and return its id.
    ///
    /// When the queue is full, completed items are evicted first and then the
    /// oldest items regardless of status.
    pub async fn enqueue(
        &self,
        operation_type: OperationType,
        payload: serde_json::Value,
    ) -> QueueItemId {
        let item = QueueItem::new(operation_type, payload);
        let id = item.id;

        let mut items = self.inner.items.lock().await;
        let evicted = evict_to(&mut items, self.inner.config.capacity.saturating_sub(1));
        if evicted > 0 {
            tracing::info!(
                "Offline queue at capacity {}; evicted {evicted} items",
                self.inner.config.capacity
            );
        }
        items.push(item);
        self.persist(&items).await;

        tracing::debug!("Enqueued {operation_type} item {id}");
        id
    }

    /// Item counts by status
    pub async fn stats(&self) -> QueueStats {
        QueueStats::from_items(self.inner.items.lock().await.iter())
    }

    /// Up to `max_size` pending items, oldest first
    pub async fn get_batch(&self, max_size: usize) -> Vec<QueueItem> {
        self.inner
            .items
            .lock()
            .await
            .iter()
            .filter(|item| item.status == QueueStatus::Pending)
            .take(max_size)
            .cloned()
            .collect()
    }

    /// Snapshot of one item
    pub async fn get_item(&self, id: &QueueItemId) -> Option<QueueItem> {
        self.inner
            .items
            .lock()
            .await
            .iter()
            .find(|item| item.id == *id)
            .cloned()
    }

    /// Snapshot of every item in insertion order
    pub async fn items(&self) -> Vec<QueueItem> {
        self.inner.items.lock().await.clone()
    }

    /// `Pending` → `Processing`
    pub async fn mark_processing(&self, id: &QueueItemId) -> bool {
        self.transition(id, QueueStatus::Processing, |_| {}).await
    }

    /// `Processing` → `Completed`, stamping `completed_at`
    pub async fn mark_completed(&self, id: &QueueItemId) -> bool {
        let now = unix_millis_now();
        self.transition(id, QueueStatus::Completed, move |item| {
            item.completed_at = Some(now);
        })
        .await
    }

    /// `Processing` → `Failed`, charging one retry
    pub async fn mark_failed(&self, id: &QueueItemId, error: impl Into<String>) -> bool {
        let error = error.into();
        let now = unix_millis_now();
        self.transition(id, QueueStatus::Failed, move |item| {
            item.retry_count = item.retry_count.saturating_add(1);
            item.last_error = Some(error);
            item.last_attempt_at = Some(now);
        })
        .await
    }

    /// Reset retry-eligible `Failed` items to `Pending`.
    ///
    /// `retry_count` is preserved, so exhausted items stay `Failed`.
    pub async fn retry_failed(&self) -> usize {
        let max_retries = self.inner.config.max_retries;
        let mut items = self.inner.items.lock().await;

        let mut reset = 0usize;
        for item in items.iter_mut().filter(|item| {
            item.status == QueueStatus::Failed && !item.has_exhausted_retries(max_retries)
        }) {
            item.status = QueueStatus::Pending;
            reset += 1;
        }

        if reset > 0 {
            self.persist(&items).await;
            tracing::debug!("Reset {reset} failed items to pending");
        }
        reset
    }

    /// Remove `Completed` items delivered more than `older_than_days` ago
    pub async fn clear_completed(&self, older_than_days: u32) -> usize {
        let cutoff = unix_millis_now().saturating_sub(days_to_millis(older_than_days));
        let mut items = self.inner.items.lock().await;

        let before = items.len();
        items.retain(|item| {
            !(item.status == QueueStatus::Completed
                && item.completed_at.is_some_and(|at| at < cutoff))
        });
        let removed = before - items.len();

        if removed > 0 {
            self.persist(&items).await;
            tracing::debug!("Purged {removed} completed items older than {older_than_days} days");
        }
        removed
    }

    /// Remove an item regardless of status
    pub async fn remove_item(&self, id: &QueueItemId) -> bool {
        let mut items = self.inner.items.lock().await;
        let before = items.len();
        items.retain(|item| item.id != *id);
        let removed = items.len() != before;
        if removed {
            self.persist(&items).await;
        }
        removed
    }

    /// Empty the queue (diagnostics only)
    pub async fn clear_all(&self) {
        let mut items = self.inner.items.lock().await;
        let count = items.len();
        items.clear();
        if let Err(error) = self.inner.store.clear().await {
            tracing::warn!("Failed to clear persisted offline queue: {}", error);
        }
        tracing::info!("Cleared {count} items from the offline queue");
    }

    async fn transition<F>(&self, id: &QueueItemId, next: QueueStatus, apply: F) -> bool
    where
        F: FnOnce(&mut QueueItem) + Send,
    {
        let mut items = self.inner.items.lock().await;
        let Some(item) = items.iter_mut().find(|item| item.id == *id) else {
            tracing::debug!("Ignoring {next} transition for unknown item {id}");
            return false;
        };

        if !item.status.can_transition_to(next) {
            tracing::warn!(
                "Ignoring invalid transition for item {id}: {} -> {next}",
                item.status
            );
            return false;
        }

        item.status = next;
        apply(item);
        self.persist(&items).await;
        true
    }

    async fn persist(&self, items: &[QueueItem]) {
        if let Err(error) = self.inner.store.save(items).await {
            tracing::warn!(
                "Failed to persist offline queue ({} items): {}",
                items.len(),
                error
            );
        }
    }
}

/// Shrink `items` to at most `limit` entries.
///
/// Completed items go first (oldest first), then the oldest remaining items
/// regardless of status. Returns how many were removed.
fn evict_to(items: &mut Vec<QueueItem>, limit: usize) -> usize {
    let overflow = items.len().saturating_sub(limit);
    if overflow == 0 {
        return 0;
    }

    let completed: HashSet<QueueItemId> = items
        .iter()
        .filter(|item| item.status == QueueStatus::Completed)
        .take(overflow)
        .map(|item| item.id)
        .collect();
    items.retain(|item| !completed.contains(&item.id));

    let remaining = items.len().saturating_sub(limit);
    if remaining > 0 {
        items.drain(..remaining);
    }

    overflow
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn open_with(config: SyncConfig) -> (QueueManager, Arc<MemoryKeyValueStore>) {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let manager = QueueManager::open(kv.clone(), config).await.unwrap();
        (manager, kv)
    }

    async fn open_default() -> (QueueManager, Arc<MemoryKeyValueStore>) {
        open_with(SyncConfig::default()).await
    }

    fn completed_item(completed_at: i64) -> QueueItem {
        let mut item = QueueItem::new(OperationType::UpdateLocation, json!({}));
        item.status = QueueStatus::Completed;
        item.completed_at = Some(completed_at);
        item
    }

    #[tokio::test]
    async fn test_enqueue_persists_pending_item() {
        let (queue, kv) = open_default().await;
        let id = queue
            .enqueue(OperationType::StartSession, json!({"client_id": 3}))
            .await;

        let item = queue.get_item(&id).await.unwrap();
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.payload, json!({"client_id": 3}));

        let raw = kv.raw("offline_queue").unwrap();
        assert!(raw.contains(&id.to_string()));
        assert_eq!(queue.stats().await.pending, 1);
    }

    #[tokio::test]
    async fn test_get_batch_is_fifo_and_pending_only() {
        let (queue, _) = open_default().await;
        let mut ids = Vec::new();
        for seq in 0..5 {
            ids.push(
                queue
                    .enqueue(OperationType::UpdateLocation, json!({ "seq": seq }))
                    .await,
            );
        }
        assert!(queue.mark_processing(&ids[1]).await);

        let batch = queue.get_batch(3).await;
        let batch_ids = batch.iter().map(|item| item.id).collect::<Vec<_>>();
        assert_eq!(batch_ids, vec![ids[0], ids[2], ids[3]]);
    }

    #[tokio::test]
    async fn test_get_batch_empty_queue() {
        let (queue, _) = open_default().await;
        assert!(queue.get_batch(50).await.is_empty());

        queue.enqueue(OperationType::EndSession, json!({})).await;
        assert!(queue.get_batch(0).await.is_empty());
    }

    #[tokio::test]
    async fn test_status_machine_rejects_invalid_transitions() {
        let (queue, _) = open_default().await;
        let id = queue.enqueue(OperationType::UploadPhoto, json!({})).await;

        // Cannot complete or fail something that was never claimed.
        assert!(!queue.mark_completed(&id).await);
        assert!(!queue.mark_failed(&id, "boom").await);

        assert!(queue.mark_processing(&id).await);
        assert!(!queue.mark_processing(&id).await);
        assert!(queue.mark_completed(&id).await);

        let item = queue.get_item(&id).await.unwrap();
        assert_eq!(item.status, QueueStatus::Completed);
        assert!(item.completed_at.is_some());

        assert!(!queue.mark_processing(&QueueItemId::new()).await);
    }

    #[tokio::test]
    async fn test_mark_failed_records_error_and_retry() {
        let (queue, _) = open_default().await;
        let id = queue.enqueue(OperationType::UpdateSession, json!({})).await;

        queue.mark_processing(&id).await;
        assert!(queue.mark_failed(&id, "HTTP 503").await);

        let item = queue.get_item(&id).await.unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.retry_count, 1);
        assert_eq!(item.last_error.as_deref(), Some("HTTP 503"));
        assert!(item.last_attempt_at.is_some());
    }

    #[tokio::test]
    async fn test_retry_failed_preserves_retry_count() {
        let (queue, _) = open_with(SyncConfig::default().with_max_retries(2)).await;
        let eligible = queue.enqueue(OperationType::UpdateLocation, json!({})).await;
        let exhausted = queue.enqueue(OperationType::UpdateLocation, json!({})).await;

        queue.mark_processing(&eligible).await;
        queue.mark_failed(&eligible, "offline").await;
        for _ in 0..2 {
            queue.mark_processing(&exhausted).await;
            queue.mark_failed(&exhausted, "offline").await;
            queue.retry_failed().await;
        }

        // `exhausted` has two failures now and must stay failed.
        let exhausted_item = queue.get_item(&exhausted).await.unwrap();
        assert_eq!(exhausted_item.status, QueueStatus::Failed);
        assert_eq!(exhausted_item.retry_count, 2);

        let eligible_item = queue.get_item(&eligible).await.unwrap();
        assert_eq!(eligible_item.status, QueueStatus::Pending);
        assert_eq!(eligible_item.retry_count, 1);

        assert_eq!(queue.retry_failed().await, 0);
    }

    #[tokio::test]
    async fn test_clear_completed_only_removes_old_completed() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let now = unix_millis_now();
        let old = completed_item(now - days_to_millis(8));
        let recent = completed_item(now - days_to_millis(1));
        let mut old_failed = QueueItem::new(OperationType::UploadPhoto, json!({}));
        old_failed.status = QueueStatus::Failed;
        old_failed.created_at = now - days_to_millis(30);
        let pending = QueueItem::new(OperationType::UpdateLocation, json!({}));

        let seeded = vec![old.clone(), recent.clone(), old_failed.clone(), pending.clone()];
        kv.put_raw("offline_queue", serde_json::to_string(&seeded).unwrap());

        let queue = QueueManager::open(kv.clone(), SyncConfig::default())
            .await
            .unwrap();
        assert_eq!(queue.clear_completed(7).await, 1);

        let remaining = queue
            .items()
            .await
            .into_iter()
            .map(|item| item.id)
            .collect::<Vec<_>>();
        assert_eq!(remaining, vec![recent.id, old_failed.id, pending.id]);
        assert_eq!(queue.clear_completed(7).await, 0);
    }

    #[tokio::test]
    async fn test_capacity_evicts_completed_first() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let pending = QueueItem::new(OperationType::UpdateLocation, json!({"n": 0}));
        let done = completed_item(unix_millis_now());
        let pending_two = QueueItem::new(OperationType::UpdateLocation, json!({"n": 1}));
        kv.put_raw(
            "offline_queue",
            serde_json::to_string(&vec![pending.clone(), done.clone(), pending_two.clone()])
                .unwrap(),
        );

        let queue = QueueManager::open(kv, SyncConfig::default().with_capacity(3))
            .await
            .unwrap();
        let new_id = queue.enqueue(OperationType::UpdateLocation, json!({"n": 2})).await;

        let ids = queue
            .items()
            .await
            .into_iter()
            .map(|item| item.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![pending.id, pending_two.id, new_id]);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_when_nothing_completed() {
        let (queue, _) = open_with(SyncConfig::default().with_capacity(3)).await;
        let mut ids = Vec::new();
        for seq in 0..5 {
            ids.push(
                queue
                    .enqueue(OperationType::UpdateLocation, json!({ "seq": seq }))
                    .await,
            );
            assert!(queue.stats().await.total <= 3);
        }

        let remaining = queue
            .items()
            .await
            .into_iter()
            .map(|item| item.id)
            .collect::<Vec<_>>();
        assert_eq!(remaining, ids[2..].to_vec());
    }

    #[tokio::test]
    async fn test_open_recovers_interrupted_items() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let mut stuck = QueueItem::new(OperationType::UploadPhoto, json!({}));
        stuck.status = QueueStatus::Processing;
        kv.put_raw("offline_queue", serde_json::to_string(&vec![stuck.clone()]).unwrap());

        let queue = QueueManager::open(kv.clone(), SyncConfig::default())
            .await
            .unwrap();
        let item = queue.get_item(&stuck.id).await.unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.retry_count, 1);
        assert_eq!(item.last_error.as_deref(), Some(INTERRUPTED_ERROR));

        // The recovery itself is persisted.
        let persisted: Vec<QueueItem> =
            serde_json::from_str(&kv.raw("offline_queue").unwrap()).unwrap();
        assert_eq!(persisted[0].status, QueueStatus::Failed);
    }

    #[tokio::test]
    async fn test_open_drops_items_out_of_retries() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let mut last_attempt = QueueItem::new(OperationType::StartSession, json!({}));
        last_attempt.status = QueueStatus::Processing;
        last_attempt.retry_count = 4;
        let mut exhausted = QueueItem::new(OperationType::EndSession, json!({}));
        exhausted.status = QueueStatus::Failed;
        exhausted.retry_count = 3;
        let mut retryable = QueueItem::new(OperationType::UpdateSession, json!({}));
        retryable.status = QueueStatus::Failed;
        retryable.retry_count = 1;
        kv.put_raw(
            "offline_queue",
            serde_json::to_string(&vec![last_attempt.clone(), exhausted.clone(), retryable.clone()])
                .unwrap(),
        );

        let queue = QueueManager::open(kv.clone(), SyncConfig::default().with_max_retries(3))
            .await
            .unwrap();
        assert!(queue.get_item(&last_attempt.id).await.is_none());
        assert!(queue.get_item(&exhausted.id).await.is_none());
        assert_eq!(queue.stats().await.failed, 1);

        let persisted: Vec<QueueItem> =
            serde_json::from_str(&kv.raw("offline_queue").unwrap()).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].id, retryable.id);
    }

    #[tokio::test]
    async fn test_items_survive_reopen() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let first = QueueManager::open(kv.clone(), SyncConfig::default())
            .await
            .unwrap();
        let id = first
            .enqueue(OperationType::UpdateLocation, json!({"lat": 1.5}))
            .await;
        drop(first);

        let reopened = QueueManager::open(kv, SyncConfig::default()).await.unwrap();
        assert_eq!(reopened.get_item(&id).await.unwrap().payload, json!({"lat": 1.5}));
    }

    #[tokio::test]
    async fn test_save_failure_keeps_memory_authoritative() {
        let (queue, kv) = open_default().await;
        kv.fail_writes(true);

        let id = queue.enqueue(OperationType::EndSession, json!({})).await;
        assert_eq!(queue.stats().await.pending, 1);
        assert!(kv.raw("offline_queue").is_none());

        // The next successful save catches the store up.
        kv.fail_writes(false);
        queue.mark_processing(&id).await;
        let persisted: Vec<QueueItem> =
            serde_json::from_str(&kv.raw("offline_queue").unwrap()).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].status, QueueStatus::Processing);
    }

    #[tokio::test]
    async fn test_remove_and_clear_all() {
        let (queue, kv) = open_default().await;
        let first = queue.enqueue(OperationType::StartSession, json!({})).await;
        queue.enqueue(OperationType::EndSession, json!({})).await;

        assert!(queue.remove_item(&first).await);
        assert!(!queue.remove_item(&first).await);
        assert_eq!(queue.stats().await.total, 1);

        queue.clear_all().await;
        assert_eq!(queue.stats().await, QueueStats::default());
        assert!(kv.raw("offline_queue").is_none());
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let result = QueueManager::open(kv, SyncConfig::default().with_capacity(0)).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_evict_to_prefers_completed_then_oldest() {
        let mut items = vec![
            QueueItem::new(OperationType::UpdateLocation, json!({})),
            completed_item(1),
            QueueItem::new(OperationType::UpdateLocation, json!({})),
            completed_item(2),
        ];
        let ids = items.iter().map(|item| item.id).collect::<Vec<_>>();

        assert_eq!(evict_to(&mut items, 4), 0);
        assert_eq!(evict_to(&mut items, 1), 3);
        assert_eq!(items.iter().map(|item| item.id).collect::<Vec<_>>(), vec![ids[2]]);
    }
}
