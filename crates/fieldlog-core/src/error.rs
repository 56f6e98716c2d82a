//! Error types for fieldlog-core

use thiserror::Error;

/// Result type alias using fieldlog-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fieldlog-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Store-level error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote endpoint rejected a delivery
    #[error("Delivery rejected ({status}): {message}")]
    Delivery {
        /// HTTP status code returned by the endpoint
        status: u16,
        /// Compacted response body for diagnostics
        message: String,
    },

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
