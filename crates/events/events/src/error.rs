//! Event error types.

use thiserror::Error;

/// Result type for event operations.
pub type EventResult<T> = Result<T, EventError>;

/// Error type for event construction and decoding.
#[derive(Debug, Error)]
pub enum EventError {
    /// Severity string not recognized.
    #[error("Invalid severity: {0}")]
    InvalidSeverity(String),

    /// Event serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::SerializationError(err.to_string())
    }
}
