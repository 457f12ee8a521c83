//! Durable queue store: the whole item list serialized under one key.

use std::sync::Arc;

use crate::error::Result;
use crate::models::QueueItem;
use crate::storage::KeyValueStore;

/// Persists and restores the full queue as a single JSON array.
///
/// Reads fail soft: missing, unreadable or corrupt data yields an empty
/// queue. Writes replace the previous contents entirely.
#[derive(Clone)]
pub struct QueueStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl QueueStore {
    /// Create a store persisting under `key`
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    /// Storage key used for the serialized queue
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load persisted items, or an empty list when nothing usable is stored
    pub async fn load(&self) -> Vec<QueueItem> {
        let raw = match self.kv.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(error) => {
                tracing::warn!("Failed to read offline queue '{}': {}", self.key, error);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<QueueItem>>(&raw) {
            Ok(items) => items,
            Err(error) => {
                tracing::warn!(
                    "Discarding unreadable offline queue '{}': {}",
                    self.key,
                    error
                );
                Vec::new()
            }
        }
    }

    /// Replace the persisted queue with `items`
    pub async fn save(&self, items: &[QueueItem]) -> Result<()> {
        let serialized = serde_json::to_string(items)?;
        self.kv.set(&self.key, serialized).await
    }

    /// Remove the persisted queue entirely
    pub async fn clear(&self) -> Result<()> {
        self.kv.remove(&self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OperationType, QueueStatus};
    use crate::storage::MemoryKeyValueStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store_with_memory() -> (QueueStore, Arc<MemoryKeyValueStore>) {
        let kv = Arc::new(MemoryKeyValueStore::new());
        (QueueStore::new(kv.clone(), "offline_queue"), kv)
    }

    fn sample_items() -> Vec<QueueItem> {
        let mut failed = QueueItem::new(OperationType::UploadPhoto, json!({"file": "a.jpg"}));
        failed.status = QueueStatus::Failed;
        failed.retry_count = 2;
        failed.last_error = Some("timeout".to_string());
        failed.last_attempt_at = Some(1_700_000_000_000);

        let mut done = QueueItem::new(OperationType::EndSession, json!({"session_id": 9}));
        done.status = QueueStatus::Completed;
        done.completed_at = Some(1_700_000_100_000);

        vec![
            QueueItem::new(
                OperationType::UpdateLocation,
                json!({"lat": 40.7, "lng": -74.0}),
            ),
            failed,
            done,
        ]
    }

    #[tokio::test]
    async fn test_load_missing_key_is_empty() {
        let (store, _) = store_with_memory();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let (store, _) = store_with_memory();
        let items = sample_items();

        store.save(&items).await.unwrap();
        let loaded = store.load().await;
        assert_eq!(loaded, items);

        // Saving what was loaded must not change anything.
        store.save(&loaded).await.unwrap();
        assert_eq!(store.load().await, items);
    }

    #[tokio::test]
    async fn test_load_corrupt_data_is_empty() {
        let (store, kv) = store_with_memory();
        kv.put_raw("offline_queue", "{not json");
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_read_failure_is_empty() {
        let (store, kv) = store_with_memory();
        store.save(&sample_items()).await.unwrap();
        kv.fail_reads(true);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_failure_is_reported() {
        let (store, kv) = store_with_memory();
        kv.fail_writes(true);
        assert!(store.save(&sample_items()).await.is_err());
        assert_eq!(kv.raw("offline_queue"), None);
    }

    #[tokio::test]
    async fn test_clear_removes_key() {
        let (store, kv) = store_with_memory();
        store.save(&sample_items()).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(kv.raw("offline_queue"), None);
        assert_eq!(store.key(), "offline_queue");
    }
}
