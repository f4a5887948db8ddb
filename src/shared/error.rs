//! Sync Engine Error Types
//!
//! This module defines the engine-level error type returned by the sync manager,
//! the remote API boundary and the queue API.
//!
//! # Error Categories
//!
//! - `Storage` - local store (SQLite) failures, propagated to the caller
//! - `Serialization` - JSON payload encoding/decoding failures
//! - `UnknownRoute` - a stored mutation whose entity/kind has no remote mapping
//! - `Network` - transport failures talking to the remote API
//! - `Http` - non-success responses from the remote API
//! - `Config` - invalid configuration
//!
//! # Usage
//!
//! ```rust
//! use fieldsync::shared::error::SyncError;
//!
//! let error = SyncError::http(500, "Internal error");
//! assert!(error.is_transient());
//! ```
use thiserror::Error;

use crate::shared::config::ConfigError;

/// Engine-level error type
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local store failure
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },

    /// A stored mutation whose entity/kind pair has no remote mapping
    #[error("No remote route for {kind}/{entity}")]
    UnknownRoute {
        /// Entity text as stored
        entity: String,
        /// Mutation kind text as stored
        kind: String,
    },

    /// Transport failure talking to the remote API
    #[error("Network error: {message}")]
    Network {
        /// Human-readable error message
        message: String,
    },

    /// Non-success HTTP response
    #[error("{message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Server-provided message, or the status text when absent
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new HTTP error
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Create a new unknown-route error
    pub fn unknown_route(entity: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnknownRoute {
            entity: entity.into(),
            kind: kind.into(),
        }
    }

    /// Whether a delivery attempt that failed with this error may be retried.
    ///
    /// Routing defects and configuration problems are never retried.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::UnknownRoute { .. } | Self::Config(_))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network(format!("request timed out: {}", err))
        } else {
            Self::network(err.to_string())
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, SyncError>;
