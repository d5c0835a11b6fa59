//! Durable sync state.
//!
//! Maps each tracked document path to its last-known content digest,
//! plus global pass counters. Persisted as JSON with atomic
//! write-temp-then-rename so a crash mid-save never corrupts the
//! previous state on disk.

use crate::SyncError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Record of the last successful synchronization pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// Tracked document path -> content digest
    #[serde(default)]
    pub file_digests: BTreeMap<String, String>,

    /// When the last pass completed
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,

    /// Id of the last version captured by a pass
    #[serde(default)]
    pub last_version: Option<String>,

    /// Number of completed passes, monotonically increasing
    #[serde(default)]
    pub sync_count: u64,
}

impl SyncState {
    /// Load state from disk; an absent file is a valid first run and
    /// yields an empty state.
    pub async fn load(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            debug!(path = ?path, "No sync state on disk, starting empty");
            return Ok(Self::default());
        }

        let json = tokio::fs::read_to_string(path).await?;
        let state: SyncState = serde_json::from_str(&json)?;

        debug!(path = ?path, tracked = state.file_digests.len(), "Loaded sync state");

        Ok(state)
    }

    /// Atomically persist state to disk.
    pub async fn save(&self, path: &Path) -> Result<(), SyncError> {
        let json = serde_json::to_string_pretty(self)?;

        let parent = path
            .parent()
            .ok_or_else(|| SyncError::StateWrite(format!("no parent dir for {}", path.display())))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::StateWrite(e.to_string()))?;

        // Atomic write: write to temp file, then rename
        let temp_path = parent.join(".sync_state.json.tmp");
        tokio::fs::write(&temp_path, &json)
            .await
            .map_err(|e| SyncError::StateWrite(e.to_string()))?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| SyncError::StateWrite(e.to_string()))?;

        debug!(path = ?path, size = json.len(), "Saved sync state");

        Ok(())
    }

    /// Record the digest for a tracked document.
    pub fn record_digest(&mut self, path: impl Into<String>, digest: impl Into<String>) {
        self.file_digests.insert(path.into(), digest.into());
    }

    /// Forget a document that no longer exists on disk.
    pub fn remove_path(&mut self, path: &str) {
        self.file_digests.remove(path);
    }

    /// Whether any pass has ever completed for this corpus.
    pub fn is_first_run(&self) -> bool {
        self.last_sync.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_absent_is_empty() {
        let dir = tempdir().unwrap();
        let state = SyncState::load(&dir.path().join("sync_state.json"))
            .await
            .unwrap();
        assert!(state.file_digests.is_empty());
        assert!(state.is_first_run());
        assert_eq!(state.sync_count, 0);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sync/sync_state.json");

        let mut state = SyncState::default();
        state.record_digest("progress.md", "abc123");
        state.last_sync = Some(Utc::now());
        state.last_version = Some("20240115_143052".to_string());
        state.sync_count = 7;

        state.save(&path).await.unwrap();
        let loaded = SyncState::load(&path).await.unwrap();

        assert_eq!(state, loaded);
    }

    #[tokio::test]
    async fn test_malformed_state_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sync_state.json");
        std::fs::write(&path, "not json").unwrap();

        let result = SyncState::load(&path).await;
        assert!(matches!(result, Err(SyncError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sync_state.json");

        SyncState::default().save(&path).await.unwrap();

        assert!(path.exists());
        assert!(!dir.path().join(".sync_state.json.tmp").exists());
    }

    #[test]
    fn test_record_and_remove() {
        let mut state = SyncState::default();
        state.record_digest("a.md", "d1");
        state.record_digest("a.md", "d2");
        assert_eq!(state.file_digests.get("a.md").unwrap(), "d2");

        state.remove_path("a.md");
        assert!(state.file_digests.is_empty());
    }
}
