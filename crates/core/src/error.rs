//! Error types for rowstream
//!
//! Two layers of errors exist:
//! - [`StoreError`]: failures reported by the row store collaborator
//! - [`StreamError`]: the terminal error a stream consumer observes
//!
//! Store failures are carried into [`StreamError::Store`] verbatim. We use
//! `thiserror` for the `Display` and `Error` implementations.

use serde::{Deserialize, Serialize};

/// Result type alias for store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for stream operations
pub type StreamResult<T> = std::result::Result<T, StreamError>;

/// Errors raised by a [`Store`](crate::Store) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StoreError {
    /// Generic backend failure (connection lost, constraint, driver error)
    #[error("backend error: {reason}")]
    Backend { reason: String },

    /// A referenced transaction or entity does not exist
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Write conflict (duplicate key, serialization failure)
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// The store does not implement the requested capability
    #[error("unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// The query could not be evaluated
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },
}

impl StoreError {
    /// Create a backend error
    pub fn backend(reason: impl Into<String>) -> Self {
        StoreError::Backend {
            reason: reason.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(reason: impl Into<String>) -> Self {
        StoreError::Conflict {
            reason: reason.into(),
        }
    }

    /// Create an unsupported-operation error
    pub fn unsupported(operation: impl Into<String>) -> Self {
        StoreError::Unsupported {
            operation: operation.into(),
        }
    }
}

/// Terminal stream errors.
///
/// # Categories
///
/// | Category | Variants | Description |
/// |----------|----------|-------------|
/// | Store | `Store` | A store call rejected; surfaced verbatim, never retried |
/// | Schema | `NoPrimaryKey`, `CompositePrimaryKey` | Mutation target key cannot be resolved |
/// | Encoding | `Serialization` | A batch could not be encoded as JSON |
/// | Input | `InvalidRequest`, `Config`, `UnknownEntity` | Bad request or configuration |
/// | Lifecycle | `Aborted` | Driver task ended without terminating the stream |
///
/// Consumer cancellation is not an error and never produces one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StreamError {
    /// A store call failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The entity declares no primary key
    #[error("no primary key declared for entity '{entity}'")]
    NoPrimaryKey { entity: String },

    /// The entity declares a multi-column primary key
    #[error("composite primary key {fields:?} on entity '{entity}' cannot scope a mutation")]
    CompositePrimaryKey { entity: String, fields: Vec<String> },

    /// JSON encoding failed
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// The stream request is malformed
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Configuration could not be read or is invalid
    #[error("config error: {reason}")]
    Config { reason: String },

    /// No configuration is registered for the entity
    #[error("unknown entity '{entity}'")]
    UnknownEntity { entity: String },

    /// The producer went away without closing or failing the stream
    #[error("stream aborted: {reason}")]
    Aborted { reason: String },
}

impl StreamError {
    /// Create an invalid-request error
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        StreamError::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        StreamError::Config {
            reason: reason.into(),
        }
    }

    /// True if the error originated in the store collaborator
    pub fn is_store_error(&self) -> bool {
        matches!(self, StreamError::Store(_))
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        StreamError::Serialization {
            reason: e.to_string(),
        }
    }
}
