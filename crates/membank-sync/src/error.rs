//! Sync engine error types.

use membank_core::CoreError;
use thiserror::Error;

/// Errors that can occur during synchronization operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core error (digesting, walking, encoding)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Atomic persist of the sync state failed
    #[error("State write failed: {0}")]
    StateWrite(String),

    /// Version snapshot could not be written
    #[error("Snapshot write failed: {0}")]
    SnapshotWrite(String),

    /// Requested version does not exist
    #[error("Version not found: {0}")]
    VersionNotFound(String),

    /// Restore refused: live corpus has unsynced changes
    #[error("Uncommitted changes in {paths:?}; pass force to overwrite")]
    UncommittedChanges { paths: Vec<String> },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}
