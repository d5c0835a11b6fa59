//! Membank Core Components
//!
//! This crate provides the shared building blocks for the membank
//! engine: configuration, content digesting, and corpus walking.

mod config;
mod digest;
mod error;
mod scan;

pub use config::EngineConfig;
pub use digest::{decode_text, digest, digest_file};
pub use error::CoreError;
pub use scan::list_documents;
