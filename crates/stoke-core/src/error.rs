//! Error types for the reconciliation core

use thiserror::Error;

/// Core error
#[derive(Debug, Error)]
pub enum CoreError {
    /// Store operation failed
    #[error("store error: {0}")]
    Store(#[from] stoke_store::StoreError),

    /// A document could not be decoded into a domain record
    #[error("malformed {collection} document {id}: {source}")]
    Decode {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
