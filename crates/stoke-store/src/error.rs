//! Error types for the store client

use thiserror::Error;

/// Store client error
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A document with the same id already exists
    #[error("Document already exists: {0}")]
    Conflict(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Realtime channel failure
    #[error("Realtime error: {0}")]
    Realtime(String),

    /// The store has been shut down
    #[error("Store closed")]
    Closed,
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
