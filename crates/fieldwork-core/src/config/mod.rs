//! Queue and sync tuning shared by every client.
//!
//! Defaults mirror the values the field app has always shipped with; clients
//! may override them from their own config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default number of failed attempts before an item is dropped.
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default maximum number of stored items.
pub const DEFAULT_CAPACITY: usize = 10_000;
/// Default number of items claimed per sync pass.
pub const DEFAULT_BATCH_SIZE: usize = 50;
/// Default fallback timer interval.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;
/// Default age after which completed items are garbage collected.
pub const DEFAULT_COMPLETED_RETENTION_DAYS: u32 = 7;
/// Default storage key holding the serialized queue.
pub const DEFAULT_STORAGE_KEY: &str = "offline_queue";
/// Default reachability polling interval for pull-only platforms.
pub const DEFAULT_CONNECTIVITY_POLL_SECS: u64 = 15;

/// Configuration for the offline queue and the sync orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Failed attempts after which an item is removed
    pub max_retries: u32,
    /// Maximum number of stored items
    pub capacity: usize,
    /// Items claimed per sync pass
    pub batch_size: usize,
    /// Fallback timer interval in seconds
    pub sync_interval_secs: u64,
    /// Completed items older than this are purged after each pass
    pub completed_retention_days: u32,
    /// Storage key the queue is persisted under
    pub storage_key: String,
    /// Re-attempt retry-eligible failed items at the start of every pass
    pub auto_retry_failed: bool,
    /// Reachability polling interval in seconds
    pub connectivity_poll_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            capacity: DEFAULT_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            completed_retention_days: DEFAULT_COMPLETED_RETENTION_DAYS,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            auto_retry_failed: true,
            connectivity_poll_secs: DEFAULT_CONNECTIVITY_POLL_SECS,
        }
    }
}

impl SyncConfig {
    /// Set the retry budget
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the maximum number of stored items
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the per-pass batch size
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the fallback timer interval
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval_secs = interval.as_secs();
        self
    }

    /// Disable automatic re-attempts of failed items (manual retry only)
    #[must_use]
    pub const fn without_auto_retry(mut self) -> Self {
        self.auto_retry_failed = false;
        self
    }

    /// Fallback timer interval as a `Duration`
    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Reachability polling interval as a `Duration`
    pub const fn connectivity_poll_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity_poll_secs)
    }

    /// Reject values that would stall or disable the queue.
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(Error::Config("max_retries must be at least 1".to_string()));
        }
        if self.capacity == 0 {
            return Err(Error::Config("capacity must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.sync_interval_secs == 0 {
            return Err(Error::Config(
                "sync_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.connectivity_poll_secs == 0 {
            return Err(Error::Config(
                "connectivity_poll_secs must be at least 1".to_string(),
            ));
        }
        if self.storage_key.trim().is_empty() {
            return Err(Error::Config("storage_key must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_values() {
        let config = SyncConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.capacity, 10_000);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.sync_interval(), Duration::from_secs(60));
        assert_eq!(config.completed_retention_days, 7);
        assert_eq!(config.storage_key, "offline_queue");
        assert!(config.auto_retry_failed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_overrides_values() {
        let config = SyncConfig::default()
            .with_max_retries(3)
            .with_capacity(10)
            .with_batch_size(2)
            .with_sync_interval(Duration::from_secs(5))
            .without_auto_retry();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.capacity, 10);
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.sync_interval_secs, 5);
        assert!(!config.auto_retry_failed);
    }

    #[test]
    fn validate_rejects_zero_values() {
        assert!(SyncConfig::default().with_capacity(0).validate().is_err());
        assert!(SyncConfig::default().with_batch_size(0).validate().is_err());
        assert!(SyncConfig::default().with_max_retries(0).validate().is_err());

        let config = SyncConfig {
            storage_key: "  ".to_string(),
            ..SyncConfig::default()
        };
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("storage_key"));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{ "batch_size": 10 }"#).unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = serde_json::from_str::<SyncConfig>(r#"{ "unexpected": true }"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }
}
