//! Membank Retrieval Index
//!
//! Splits tracked documents into section-aligned chunks, attaches
//! embedding vectors through an injected provider, and serves both
//! nearest-neighbor and literal substring queries.

mod chunker;
mod embedder;
mod error;
mod index;

pub use chunker::{chunk_document, Chunk, ChunkIndexer, ChunkLimits};
pub use embedder::Embedder;
pub use error::IndexError;
pub use index::{EmbeddingIndex, SearchHit};
