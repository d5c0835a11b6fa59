//! Versioned snapshots of the tracked corpus.
//!
//! Each version is an immutable, timestamped copy of every tracked
//! document, optionally zstd-compressed per file, staged in a hidden
//! temporary directory and renamed into place so a failed create is
//! never visible to `list`.

use crate::SyncError;
use chrono::{DateTime, Utc};
use membank_core::{digest_file, list_documents};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Compression level for snapshot files.
const ZSTD_LEVEL: i32 = 3;

/// Metadata describing one immutable version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionMetadata {
    /// Version id, derived from the creation timestamp
    pub id: String,
    /// When the version was created
    pub created_at: DateTime<Utc>,
    /// Whether files are stored zstd-compressed
    pub compressed: bool,
    /// Relative paths captured in this version
    pub files: Vec<String>,
    /// Number of captured files
    pub file_count: usize,
    /// Total uncompressed size in bytes
    pub total_bytes: u64,
    /// Version that preceded this one, if any
    pub prev_version: Option<String>,
}

/// Creates, lists, restores, and prunes corpus versions.
pub struct SnapshotStore {
    root: PathBuf,
    versions_dir: PathBuf,
    compress: bool,
}

impl SnapshotStore {
    /// Create a store for the given corpus root and versions directory.
    pub fn new(root: PathBuf, versions_dir: PathBuf, compress: bool) -> Self {
        Self {
            root,
            versions_dir,
            compress,
        }
    }

    /// Capture a new version of every currently tracked document.
    ///
    /// The version id derives from `timestamp`, or the current time
    /// when none is given; callers capturing several artifacts in one
    /// pass can pass a shared timestamp. The version is staged under a
    /// hidden temporary name and renamed into place on success; a
    /// failed create leaves nothing visible.
    pub async fn create(
        &self,
        timestamp: Option<DateTime<Utc>>,
        prev_version: Option<String>,
    ) -> Result<VersionMetadata, SyncError> {
        tokio::fs::create_dir_all(&self.versions_dir)
            .await
            .map_err(|e| SyncError::SnapshotWrite(e.to_string()))?;

        let id = self.unique_version_id(timestamp.unwrap_or_else(Utc::now));
        let stage = self.versions_dir.join(format!(".{id}.tmp"));

        let result = self.write_version(&id, &stage, prev_version).await;

        match result {
            Ok(metadata) => {
                let final_dir = self.versions_dir.join(&id);
                tokio::fs::rename(&stage, &final_dir)
                    .await
                    .map_err(|e| SyncError::SnapshotWrite(e.to_string()))?;

                info!(
                    version = %id,
                    files = metadata.file_count,
                    bytes = metadata.total_bytes,
                    compressed = metadata.compressed,
                    "Created version"
                );

                Ok(metadata)
            }
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&stage).await;
                Err(e)
            }
        }
    }

    async fn write_version(
        &self,
        id: &str,
        stage: &Path,
        prev_version: Option<String>,
    ) -> Result<VersionMetadata, SyncError> {
        let files = list_documents(&self.root)?;

        tokio::fs::create_dir_all(stage)
            .await
            .map_err(|e| SyncError::SnapshotWrite(e.to_string()))?;

        let mut total_bytes = 0u64;

        for rel in &files {
            let source = self.root.join(rel);
            let bytes = tokio::fs::read(&source)
                .await
                .map_err(|e| SyncError::SnapshotWrite(format!("{rel}: {e}")))?;
            total_bytes += bytes.len() as u64;

            let target = if self.compress {
                stage.join(format!("{rel}.zst"))
            } else {
                stage.join(rel)
            };

            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| SyncError::SnapshotWrite(e.to_string()))?;
            }

            let payload = if self.compress {
                zstd::encode_all(&bytes[..], ZSTD_LEVEL)
                    .map_err(|e| SyncError::SnapshotWrite(format!("{rel}: {e}")))?
            } else {
                bytes
            };

            tokio::fs::write(&target, payload)
                .await
                .map_err(|e| SyncError::SnapshotWrite(format!("{rel}: {e}")))?;

            debug!(version = %id, file = %rel, "Captured file");
        }

        let metadata = VersionMetadata {
            id: id.to_string(),
            created_at: Utc::now(),
            compressed: self.compress,
            file_count: files.len(),
            files,
            total_bytes,
            prev_version,
        };

        let json = serde_json::to_string_pretty(&metadata)?;
        tokio::fs::write(stage.join("metadata.json"), json)
            .await
            .map_err(|e| SyncError::SnapshotWrite(e.to_string()))?;

        Ok(metadata)
    }

    /// List all available versions, newest first.
    pub async fn list(&self) -> Result<Vec<VersionMetadata>, SyncError> {
        if !self.versions_dir.exists() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.versions_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                // In-flight stage directory from a concurrent or failed create
                continue;
            }

            let metadata_path = entry.path().join("metadata.json");
            let json = match tokio::fs::read_to_string(&metadata_path).await {
                Ok(json) => json,
                Err(_) => continue,
            };

            match serde_json::from_str::<VersionMetadata>(&json) {
                Ok(metadata) => versions.push(metadata),
                Err(e) => {
                    warn!(version = %name, error = %e, "Skipping version with unreadable metadata");
                }
            }
        }

        // Ids sort chronologically, newest first
        versions.sort_by(|a, b| b.id.cmp(&a.id));

        Ok(versions)
    }

    /// Restore the tracked corpus to a version's contents.
    ///
    /// Refuses when the live corpus has digests diverging from
    /// `recorded` (unsynced edits would be silently discarded) unless
    /// `force` is set. Files in the version overwrite their live
    /// counterparts; newer untracked files are left in place.
    pub async fn restore(
        &self,
        id: &str,
        recorded: &BTreeMap<String, String>,
        force: bool,
    ) -> Result<VersionMetadata, SyncError> {
        let version_dir = self.versions_dir.join(id);
        if !version_dir.is_dir() {
            return Err(SyncError::VersionNotFound(id.to_string()));
        }

        let metadata_path = version_dir.join("metadata.json");
        if !metadata_path.exists() {
            return Err(SyncError::VersionNotFound(id.to_string()));
        }
        let json = tokio::fs::read_to_string(&metadata_path).await?;
        let metadata: VersionMetadata = serde_json::from_str(&json)?;

        if !force {
            let dirty = self.diverged_paths(recorded).await?;
            if !dirty.is_empty() {
                return Err(SyncError::UncommittedChanges { paths: dirty });
            }
        }

        for rel in &metadata.files {
            let compressed_path = version_dir.join(format!("{rel}.zst"));
            let plain_path = version_dir.join(rel);

            let bytes = if metadata.compressed && compressed_path.exists() {
                let payload = tokio::fs::read(&compressed_path).await?;
                zstd::decode_all(&payload[..])
                    .map_err(|e| SyncError::SnapshotWrite(format!("{rel}: {e}")))?
            } else if plain_path.exists() {
                tokio::fs::read(&plain_path).await?
            } else {
                // Versions are immutable; a listed file without a
                // payload means the version is corrupt
                return Err(SyncError::SnapshotWrite(format!(
                    "{rel}: payload missing from version {id}"
                )));
            };

            let target = self.root.join(rel);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, bytes).await?;
        }

        info!(version = %id, files = metadata.file_count, "Restored version");

        Ok(metadata)
    }

    /// Delete old versions, keeping the `keep` most recent.
    ///
    /// Never called by the engine itself; retention is an operational
    /// concern invoked explicitly.
    pub async fn prune(&self, keep: usize) -> Result<usize, SyncError> {
        let versions = self.list().await?;

        if versions.len() <= keep {
            return Ok(0);
        }

        let mut deleted = 0;
        for version in versions.into_iter().skip(keep) {
            tokio::fs::remove_dir_all(self.versions_dir.join(&version.id)).await?;
            debug!(version = %version.id, "Deleted version");
            deleted += 1;
        }

        info!(deleted = deleted, kept = keep, "Pruned versions");

        Ok(deleted)
    }

    /// Paths whose live digest differs from the recorded state,
    /// including tracked files missing on disk and untracked additions.
    async fn diverged_paths(
        &self,
        recorded: &BTreeMap<String, String>,
    ) -> Result<Vec<String>, SyncError> {
        let mut dirty = Vec::new();
        let live = list_documents(&self.root)?;

        for rel in &live {
            let current = digest_file(&self.root.join(rel)).await?;
            match recorded.get(rel) {
                Some(known) if *known == current => {}
                _ => dirty.push(rel.clone()),
            }
        }

        for rel in recorded.keys() {
            if !live.contains(rel) {
                dirty.push(rel.clone());
            }
        }

        Ok(dirty)
    }

    fn unique_version_id(&self, now: DateTime<Utc>) -> String {
        let base = now.format("%Y%m%d_%H%M%S").to_string();
        let mut id = base.clone();
        let mut n = 1;
        while self.versions_dir.join(&id).exists() {
            id = format!("{base}_{n}");
            n += 1;
        }
        id
    }
}
