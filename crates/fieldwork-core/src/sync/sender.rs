//! Per-operation remote senders.
//!
//! The orchestrator knows nothing about wire formats: it hands each payload
//! to the sender registered for the item's operation type and only looks at
//! `Ok` versus `Err`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;

use crate::models::OperationType;

/// Why a send attempt failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    /// Transport-level failure (offline, DNS, timeout)
    #[error("Server unreachable: {0}")]
    Unavailable(String),
    /// The server answered with an error status
    #[error("Server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The queued payload cannot be sent as-is
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Result of one send attempt
pub type SendResult = Result<(), SendError>;

/// Delivers one operation's payload to the server.
///
/// Implementations must eventually resolve; the orchestrator imposes no
/// timeout of its own.
pub trait RemoteSender: Send + Sync {
    /// Send `payload`; `Ok` means the server accepted it
    fn send<'a>(&'a self, payload: &'a serde_json::Value) -> BoxFuture<'a, SendResult>;
}

/// Adapter turning an async closure into a [`RemoteSender`]
pub struct FnSender<F> {
    send: F,
}

/// Wrap `send` as a [`RemoteSender`]; the closure receives an owned payload.
pub const fn sender_fn<F, Fut>(send: F) -> FnSender<F>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = SendResult> + Send + 'static,
{
    FnSender { send }
}

impl<F, Fut> RemoteSender for FnSender<F>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = SendResult> + Send + 'static,
{
    fn send<'a>(&'a self, payload: &'a serde_json::Value) -> BoxFuture<'a, SendResult> {
        (self.send)(payload.clone()).boxed()
    }
}

/// Mapping from operation type to the sender that delivers it
#[derive(Clone, Default)]
pub struct SenderRegistry {
    senders: HashMap<OperationType, Arc<dyn RemoteSender>>,
}

impl SenderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sender` for `operation`, replacing any previous one
    #[must_use]
    pub fn register(self, operation: OperationType, sender: impl RemoteSender + 'static) -> Self {
        self.register_shared(operation, Arc::new(sender))
    }

    /// Register an already shared sender for `operation`
    #[must_use]
    pub fn register_shared(
        mut self,
        operation: OperationType,
        sender: Arc<dyn RemoteSender>,
    ) -> Self {
        self.senders.insert(operation, sender);
        self
    }

    /// Sender for `operation`, if registered
    pub fn get(&self, operation: OperationType) -> Option<Arc<dyn RemoteSender>> {
        self.senders.get(&operation).cloned()
    }

    /// Whether a sender exists for `operation`
    pub fn contains(&self, operation: OperationType) -> bool {
        self.senders.contains_key(&operation)
    }

    /// Operation types that have no sender
    pub fn missing(&self) -> Vec<OperationType> {
        OperationType::ALL
            .into_iter()
            .filter(|operation| !self.contains(*operation))
            .collect()
    }
}
