//! Error types for the pipeline collaborators.
//!
//! One enum per collaborator so callers match on exactly the failures that
//! collaborator can produce.

use thiserror::Error;

/// Failures of a [`WorkQueue`](crate::WorkQueue) edge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Nothing arrived within the receive bound. Expected before seeding.
    #[error("No work item within {0}ms")]
    Timeout(u64),

    /// Bounded queue is at capacity
    #[error("Queue full (capacity {0})")]
    Full(usize),

    /// The edge was closed by either side
    #[error("Queue closed")]
    Closed,
}

impl QueueError {
    /// True for the transient "nothing ready yet" case.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Failures of a [`StateStore`](crate::StateStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No value is stored under the handle
    #[error("Handle not found: {0}")]
    NotFound(String),

    /// Store refused the write
    #[error("Store full ({0} entries)")]
    Full(usize),

    /// A writer panicked while holding the store lock
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Failures of a [`PublishSocket`](crate::PublishSocket).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Another publisher already owns the address
    #[error("Address already in use: {0}")]
    AddressInUse(String),

    /// Bind failed for any other reason
    #[error("Bind to {address} failed: {reason}")]
    Bind { address: String, reason: String },

    /// Fire-and-forget send was rejected by the transport
    #[error("Send failed: {0}")]
    Send(String),

    /// Send attempted before `bind` (or after `close`)
    #[error("Socket not bound")]
    NotBound,
}

impl TransportError {
    /// Creates a bind error.
    pub fn bind(address: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Bind {
            address: address.into(),
            reason: reason.to_string(),
        }
    }
}

/// A component vector does not fit the shape it is being poured into.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Shape mismatch: expected {expected} components, got {actual}")]
pub struct ShapeError {
    pub expected: usize,
    pub actual: usize,
}
