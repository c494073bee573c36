//! Error types for the tickbars dashboard.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the tickbars dashboard.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (invalid threshold, unknown menu choice, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (malformed or missing data).
    #[error("Data error: {0}")]
    Data(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Whether this error came from an invalid parameter rather than bad data.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Whether this error came from malformed input data.
    pub fn is_data(&self) -> bool {
        matches!(self, Error::Data(_))
    }
}
