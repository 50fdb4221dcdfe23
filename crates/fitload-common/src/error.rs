//! Error types for fitload
//!
//! Fatal conditions (configuration, sink connection) surface here and abort
//! before any file is processed. Non-fatal conditions (identity parse,
//! schema mismatch, unknown frame variant) are absorbed where they are
//! detected: they are logged and leave an in-band sentinel in the output
//! record instead of an error.

use thiserror::Error;

/// Result type alias for fitload operations
pub type Result<T> = std::result::Result<T, FitError>;

/// Main error type for fitload
#[derive(Error, Debug)]
pub enum FitError {
    /// Settings file or profile is missing or invalid
    #[error("Configuration error: {0}. Check the settings file and the profile name passed with -c.")]
    Config(String),

    /// Sink is unreachable
    #[error("Connection error: {0}. Check the sink connection string.")]
    Connection(String),

    /// Sink rejected an operation after the connection was established
    #[error("Database error: {0}")]
    Database(String),

    /// Frame stream could not be read
    #[error("Decode error: {0}")]
    Decode(String),

    /// A file's processing exceeded its time budget
    #[error("Timed out after {0}s while processing file")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FitError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
