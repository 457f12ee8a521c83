use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] fieldwork_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("Invalid JSON payload: {0}")]
    InvalidPayload(String),
    #[error("Queue item not found: {0}")]
    ItemNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Refusing to clear the queue without --yes")]
    ClearNotConfirmed,
    #[error("Sync did not run: {0}")]
    SyncSkipped(String),
}
