//! Error types

use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration (bad option values, incomplete logger)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Connection string could not be parsed
    #[error("invalid connection string: {0}")]
    ConnectionString(String),

    /// Failure reported by the underlying database driver
    #[error("driver error: {0}")]
    Driver(String),

    /// Lifecycle listeners could not be attached to the connection
    #[error("could not apply listeners: {0}")]
    Listener(String),

    /// Illegal readiness transition
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// JSON encoding error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error came from the driver side rather than local configuration
    pub fn is_driver_error(&self) -> bool {
        matches!(self, Self::Driver(_))
    }
}
