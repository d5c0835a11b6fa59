//! Engine-level error type.

use membank_core::CoreError;
use membank_index::IndexError;
use membank_sync::SyncError;
use thiserror::Error;

/// Errors surfaced by the engine facade.
///
/// Each variant wraps the error type of the layer it came from, so
/// callers can still match on the underlying failure.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Synchronization or versioning failure
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Indexing or search failure
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Configuration, encoding, or corpus walking failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// I/O error while reading corpus documents
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
