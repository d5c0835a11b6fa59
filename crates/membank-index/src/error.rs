//! Retrieval index error types.

use membank_core::CoreError;
use thiserror::Error;

/// Errors that can occur during indexing and search operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// I/O error during index persistence
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core error (encoding, walking)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// External embedding provider failed
    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// Vector dimension does not match the configured dimension
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for IndexError {
    fn from(e: serde_json::Error) -> Self {
        IndexError::Serialization(e.to_string())
    }
}
