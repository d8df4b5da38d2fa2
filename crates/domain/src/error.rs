//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A schema-required field is missing or null on an entity.
    #[error("{entity_type} {entity_id}: required field {field} is missing")]
    MissingRequiredField {
        entity_type: String,
        entity_id: String,
        field: String,
    },

    /// No committed events exist for the targeted entity.
    #[error("{entity_type} not found: {entity_id}")]
    EntityNotFound {
        entity_type: String,
        entity_id: String,
    },

    /// The caller-supplied sequence number does not match the entity's
    /// committed head. Raised before any event is recorded.
    #[error("stale sequence number for {entity_id}: expected {expected}, found {actual}")]
    StaleSequence {
        entity_id: String,
        expected: i64,
        actual: i64,
    },

    /// A command handler panicked; converted to an error so sibling
    /// handlers and the dispatcher are unaffected.
    #[error("command handler panicked: {message}")]
    HandlerPanic { message: String },

    /// The request context was cancelled before dispatch started.
    #[error("operation cancelled")]
    Cancelled,

    /// An error occurred in the event store.
    #[error("event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
