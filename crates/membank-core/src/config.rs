//! Configuration for a membank engine instance.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration, one per tracked corpus root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root directory of the tracked corpus
    pub root: PathBuf,

    /// Auto-sync interval in minutes
    #[serde(default = "default_interval_minutes")]
    pub auto_sync_interval_mins: u64,

    /// Compress version snapshots with zstd
    #[serde(default = "default_compress")]
    pub compress: bool,

    /// Create a version snapshot at the end of each sync pass
    #[serde(default = "default_auto_version")]
    pub auto_version: bool,

    /// Maximum chunk size in bytes
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Minimum chunk size in bytes; smaller residue is dropped
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,

    /// Default similarity threshold for semantic search
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Expected embedding vector dimension
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

fn default_interval_minutes() -> u64 {
    30
}

fn default_compress() -> bool {
    true
}

fn default_auto_version() -> bool {
    true
}

fn default_max_chunk_size() -> usize {
    1000
}

fn default_min_chunk_size() -> usize {
    100
}

fn default_similarity_threshold() -> f32 {
    0.5
}

fn default_embedding_dim() -> usize {
    384
}

impl EngineConfig {
    /// Create a configuration with defaults for the given corpus root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            auto_sync_interval_mins: default_interval_minutes(),
            compress: default_compress(),
            auto_version: default_auto_version(),
            max_chunk_size: default_max_chunk_size(),
            min_chunk_size: default_min_chunk_size(),
            similarity_threshold: default_similarity_threshold(),
            embedding_dim: default_embedding_dim(),
        }
    }

    /// Load configuration from a YAML file.
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Directory holding engine bookkeeping (sync state).
    pub fn sync_dir(&self) -> PathBuf {
        self.root.join("sync")
    }

    /// Durable sync state file.
    pub fn state_file(&self) -> PathBuf {
        self.sync_dir().join("sync_state.json")
    }

    /// Directory holding version snapshots.
    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    /// Directory holding the persisted chunk index.
    pub fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    /// Ensure the engine's bookkeeping directories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.sync_dir())?;
        std::fs::create_dir_all(self.versions_dir())?;
        std::fs::create_dir_all(self.index_dir())?;
        Ok(())
    }
}
