use thiserror::Error;

/// Errors that can occur when persisting or reading events.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// An event in a batch failed domain validation.
    ///
    /// The whole batch is rolled back and only the first failure found
    /// is reported.
    #[error("invalid event {event_id}: {field} is missing or zero")]
    InvalidEvent {
        event_id: String,
        field: &'static str,
    },

    /// The caller's expected sequence number does not match the
    /// committed head of the aggregate's stream.
    #[error("stale sequence number for aggregate {root_id}: expected {expected}, found {actual}")]
    StaleSequence {
        root_id: String,
        expected: i64,
        actual: i64,
    },

    /// A subscriber returned an error during event fan-out.
    #[error("subscriber {subscriber} failed: {message}")]
    Subscriber { subscriber: String, message: String },

    /// A subscriber panicked during event fan-out.
    #[error("subscriber {subscriber} panicked")]
    SubscriberPanic { subscriber: String },

    /// The request context was cancelled before the operation finished.
    #[error("operation cancelled")]
    Cancelled,

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
