//! Notifier error types.

use thiserror::Error;

/// Result type for notifier delivery operations.
pub type NotifierResult<T> = Result<T, DeliveryError>;

/// Error raised while constructing a notifier.
///
/// A notifier that failed construction does not exist, so there is nothing
/// to call `post` on.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The provider requires a credential and none was given.
    #[error("{provider} credential cannot be empty")]
    MissingCredential {
        /// Provider name.
        provider: &'static str,
    },

    /// The provider has no default endpoint and none was given.
    #[error("{provider} target URL cannot be empty")]
    MissingTargetUrl {
        /// Provider name.
        provider: &'static str,
    },

    /// A URL setting could not be parsed. The value itself is not echoed
    /// because proxy URLs may embed credentials.
    #[error("Invalid {field}: {reason}")]
    InvalidUrl {
        /// Name of the offending setting.
        field: &'static str,
        /// Parser message.
        reason: String,
    },

    /// A static header name or value is not valid HTTP.
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader {
        /// Header name as configured.
        name: String,
        /// Parser message.
        reason: String,
    },

    /// The custom trust store could not be loaded.
    #[error("Invalid trust store: {0}")]
    InvalidTrustStore(String),

    /// The HTTP transport could not be built.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// Error returned by `Notifier::post` when an event could not be delivered.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The provider payload could not be serialized.
    #[error("Failed to serialize payload: {0}")]
    Serialization(String),

    /// The request could not be built or failed in a way retrying cannot fix.
    #[error("POST {target} failed after {attempts} attempt(s): {message}")]
    Request {
        /// Target URL.
        target: String,
        /// Underlying error message.
        message: String,
        /// Number of requests issued, including the failing one.
        attempts: u32,
        /// Status of the last response, if any attempt got one.
        last_status: Option<u16>,
    },

    /// The backend answered with a non-retryable status.
    #[error("POST {target} rejected with status {status}: {body}")]
    Rejected {
        /// Target URL.
        target: String,
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        body: String,
        /// Number of requests issued.
        attempts: u32,
    },

    /// Every allowed attempt failed with a retryable error.
    #[error("POST {target} failed after {attempts} attempt(s): {cause}")]
    RetriesExhausted {
        /// Target URL.
        target: String,
        /// Number of requests issued.
        attempts: u32,
        /// Status of the last response, if any attempt got one.
        last_status: Option<u16>,
        /// Description of the last failure.
        cause: String,
    },

    /// The caller cancelled the delivery.
    #[error("POST {target} cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Target URL.
        target: String,
        /// Number of requests issued.
        attempts: u32,
        /// Status of the last response, if any attempt got one.
        last_status: Option<u16>,
    },

    /// The caller's deadline passed before delivery succeeded.
    #[error("POST {target} deadline exceeded after {attempts} attempt(s)")]
    DeadlineExceeded {
        /// Target URL.
        target: String,
        /// Number of requests issued.
        attempts: u32,
        /// Status of the last response, if any attempt got one.
        last_status: Option<u16>,
    },
}

impl DeliveryError {
    /// Returns the last HTTP status seen, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DeliveryError::Rejected { status, .. } => Some(*status),
            DeliveryError::Request { last_status, .. }
            | DeliveryError::RetriesExhausted { last_status, .. }
            | DeliveryError::Cancelled { last_status, .. }
            | DeliveryError::DeadlineExceeded { last_status, .. } => *last_status,
            DeliveryError::Serialization(_) => None,
        }
    }

    /// Returns the number of requests issued before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryError::Request { attempts, .. }
            | DeliveryError::Rejected { attempts, .. }
            | DeliveryError::RetriesExhausted { attempts, .. }
            | DeliveryError::Cancelled { attempts, .. }
            | DeliveryError::DeadlineExceeded { attempts, .. } => *attempts,
            DeliveryError::Serialization(_) => 0,
        }
    }

    /// Returns true if the caller's context ended the delivery.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            DeliveryError::Cancelled { .. } | DeliveryError::DeadlineExceeded { .. }
        )
    }
}

impl From<serde_json::Error> for DeliveryError {
    fn from(err: serde_json::Error) -> Self {
        DeliveryError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for ConfigError {
    fn from(err: reqwest::Error) -> Self {
        ConfigError::ClientBuild(err.to_string())
    }
}
