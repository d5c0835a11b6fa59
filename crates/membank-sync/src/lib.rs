//! Membank Synchronization Engine
//!
//! Tracks a corpus of text documents by content digest, persists the
//! sync state durably, captures compressed point-in-time versions, and
//! verifies consistency between recorded state and disk.

mod consistency;
mod error;
mod snapshot;
mod state;
mod syncer;

pub use consistency::{ConsistencyChecker, ConsistencyReport};
pub use error::SyncError;
pub use snapshot::{SnapshotStore, VersionMetadata};
pub use state::SyncState;
pub use syncer::{SyncResult, SyncStatus, Syncer};
