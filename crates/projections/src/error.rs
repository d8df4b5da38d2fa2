//! Projection error types.

use thiserror::Error;

/// Errors that can occur during projection processing or replay.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the event store.
    #[error("event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// Failed to deserialize an event payload.
    #[error("event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The request context was cancelled mid-replay.
    #[error("replay cancelled")]
    Cancelled,

    /// A projection-specific error.
    #[error("projection error: {0}")]
    Projection(String),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
