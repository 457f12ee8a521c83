//! fieldwork-core - Offline durability and sync for field-work clients
//!
//! This crate contains the durable operation queue, connectivity tracking and
//! the sync orchestrator shared by every fieldwork interface. Mutations made
//! while offline are queued, persisted and replayed once the backend is
//! reachable again.

pub mod config;
pub mod connectivity;
pub mod error;
pub mod models;
pub mod queue;
pub mod state;
pub mod storage;
pub mod sync;
pub mod util;

pub use config::SyncConfig;
pub use connectivity::{ConnectivityMonitor, ReachabilityProbe};
pub use error::{Error, Result};
pub use models::{OperationType, QueueItem, QueueItemId, QueueStats, QueueStatus};
pub use queue::{QueueManager, QueueStore};
pub use state::SyncState;
pub use storage::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
pub use sync::{
    sender_fn, RemoteSender, SendError, SenderRegistry, SyncEvent, SyncOrchestrator, SyncOutcome,
    SyncStatus,
};
