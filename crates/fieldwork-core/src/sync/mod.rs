//! Sync orchestration: senders, events and the pass runner.

mod events;
mod orchestrator;
mod sender;

pub use events::{ListenerId, SyncEvent};
pub use orchestrator::{SyncOrchestrator, SyncOutcome, SyncStatus};
pub use sender::{sender_fn, FnSender, RemoteSender, SendError, SendResult, SenderRegistry};
