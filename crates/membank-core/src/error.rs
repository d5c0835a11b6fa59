//! Core error types for membank.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document bytes are not valid UTF-8
    #[error("Encoding error in {}: {message}", path.display())]
    Encoding { path: PathBuf, message: String },

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid corpus root path
    #[error("Invalid corpus root: {}", .0.display())]
    InvalidRoot(PathBuf),
}
