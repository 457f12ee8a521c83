//! Data models for the offline queue

mod operation;
mod queue_item;

pub use operation::OperationType;
pub use queue_item::{QueueItem, QueueItemId, QueueStats, QueueStatus};
