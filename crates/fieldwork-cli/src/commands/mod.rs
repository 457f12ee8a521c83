pub mod common;
pub mod config;
pub mod enqueue;
pub mod list;
pub mod maintenance;
pub mod sync;
