//! Membank Engine
//!
//! The top-level facade over the memory bank: versioned corpus
//! synchronization from `membank-sync` plus semantic and exact
//! retrieval from `membank-index`, bound to one corpus root.

mod engine;
mod error;

pub use engine::MemoryBank;
pub use error::EngineError;

pub use membank_core::EngineConfig;
pub use membank_index::{Chunk, Embedder, IndexError, SearchHit};
pub use membank_sync::{ConsistencyReport, SyncError, SyncResult, SyncStatus, VersionMetadata};
