//! Queue item model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::OperationType;
use crate::util::unix_millis_now;

/// A unique identifier for a queue item, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueItemId(Uuid);

impl QueueItemId {
    /// Create a new unique item ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for QueueItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// Delivery status of a queued item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting to be claimed by a sync pass
    #[default]
    Pending,
    /// Claimed by the running pass and being sent
    Processing,
    /// Last send attempt failed
    Failed,
    /// Delivered to the server
    Completed,
}

impl QueueStatus {
    /// Whether the status machine permits moving from `self` to `next`.
    ///
    /// Removal of exhausted `Failed` items is not a status change and is
    /// handled by the queue manager directly.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed | Self::Failed)
                | (Self::Failed, Self::Pending)
        )
    }

    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Failed => "failed",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "failed" => Ok(Self::Failed),
            "completed" => Ok(Self::Completed),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown queue status '{other}' (expected pending, processing, failed or completed)"
            ))),
        }
    }
}

/// One pending server mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Unique identifier
    pub id: QueueItemId,
    /// Remote action to perform
    pub operation_type: OperationType,
    /// Operation-specific data, opaque to the queue
    pub payload: serde_json::Value,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Delivery status
    pub status: QueueStatus,
    /// Number of failed send attempts
    #[serde(default)]
    pub retry_count: u32,
    /// Reason recorded by the last failed attempt
    #[serde(default)]
    pub last_error: Option<String>,
    /// Timestamp of the last failed attempt (Unix ms)
    #[serde(default)]
    pub last_attempt_at: Option<i64>,
    /// Delivery timestamp (Unix ms), used for garbage collection
    #[serde(default)]
    pub completed_at: Option<i64>,
}

impl QueueItem {
    /// Create a new pending item for the given operation
    #[must_use]
    pub fn new(operation_type: OperationType, payload: serde_json::Value) -> Self {
        Self {
            id: QueueItemId::new(),
            operation_type,
            payload,
            created_at: unix_millis_now(),
            status: QueueStatus::Pending,
            retry_count: 0,
            last_error: None,
            last_attempt_at: None,
            completed_at: None,
        }
    }

    /// Whether the item has used up its retry budget
    #[must_use]
    pub const fn has_exhausted_retries(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }
}

/// Item counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub failed: usize,
    pub completed: usize,
}

impl QueueStats {
    /// Count items by status
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a QueueItem>) -> Self {
        items.into_iter().fold(Self::default(), |mut stats, item| {
            stats.total += 1;
            match item.status {
                QueueStatus::Pending => stats.pending += 1,
                QueueStatus::Processing => stats.processing += 1,
                QueueStatus::Failed => stats.failed += 1,
                QueueStatus::Completed => stats.completed += 1,
            }
            stats
        })
    }
}
