//! Offline queue of pending server mutations.
//!
//! [`QueueStore`] persists the item list under a single storage key and
//! [`QueueManager`] owns the status state machine, retry accounting, garbage
//! collection and capacity policy on top of it.

mod manager;
mod store;

pub use manager::QueueManager;
pub use store::QueueStore;
