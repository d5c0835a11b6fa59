//! Cross-check between recorded sync state and the live corpus.

use crate::{SyncError, SyncState};
use membank_core::{digest_file, list_documents};
use std::path::PathBuf;
use tracing::debug;

/// Point-in-time diff between recorded state and disk contents.
///
/// Ephemeral; produced on demand and never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsistencyReport {
    /// Tracked but absent on disk
    pub missing: Vec<String>,
    /// Digest differs from the recorded value
    pub modified: Vec<String>,
    /// Present on disk but not tracked
    pub untracked: Vec<String>,
}

impl ConsistencyReport {
    /// True when recorded state and disk fully agree.
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.modified.is_empty() && self.untracked.is_empty()
    }
}

/// Re-hashes the live corpus and diffs it against a [`SyncState`].
///
/// Read-only; safe to call at any time, including while a sync pass is
/// in flight (the report may then show transient divergence).
pub struct ConsistencyChecker {
    root: PathBuf,
}

impl ConsistencyChecker {
    /// Create a checker for the given corpus root.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Produce a consistency report for the given recorded state.
    pub async fn check(&self, state: &SyncState) -> Result<ConsistencyReport, SyncError> {
        let mut report = ConsistencyReport::default();
        let live = list_documents(&self.root)?;

        for (rel, known) in &state.file_digests {
            if !live.contains(rel) {
                report.missing.push(rel.clone());
                continue;
            }

            let current = digest_file(&self.root.join(rel)).await?;
            if current != *known {
                report.modified.push(rel.clone());
            }
        }

        for rel in live {
            if !state.file_digests.contains_key(&rel) {
                report.untracked.push(rel);
            }
        }

        debug!(
            missing = report.missing.len(),
            modified = report.modified.len(),
            untracked = report.untracked.len(),
            "Consistency check"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use membank_core::digest;
    use tempfile::tempdir;

    fn tracked_state(root: &std::path::Path) -> SyncState {
        let mut state = SyncState::default();
        for rel in list_documents(root).unwrap() {
            let bytes = std::fs::read(root.join(&rel)).unwrap();
            state.record_digest(rel, digest(&bytes));
        }
        state.last_sync = Some(chrono::Utc::now());
        state
    }

    #[tokio::test]
    async fn test_clean_corpus() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::write(dir.path().join("b.md"), "b").unwrap();

        let state = tracked_state(dir.path());
        let checker = ConsistencyChecker::new(dir.path().to_path_buf());

        let report = checker.check(&state).await.unwrap();
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_detects_all_divergence_kinds() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("kept.md"), "kept").unwrap();
        std::fs::write(dir.path().join("edited.md"), "before").unwrap();
        std::fs::write(dir.path().join("doomed.md"), "doomed").unwrap();

        let state = tracked_state(dir.path());

        std::fs::write(dir.path().join("edited.md"), "after").unwrap();
        std::fs::remove_file(dir.path().join("doomed.md")).unwrap();
        std::fs::write(dir.path().join("new.md"), "new").unwrap();

        let checker = ConsistencyChecker::new(dir.path().to_path_buf());
        let report = checker.check(&state).await.unwrap();

        assert_eq!(report.missing, vec!["doomed.md"]);
        assert_eq!(report.modified, vec!["edited.md"]);
        assert_eq!(report.untracked, vec!["new.md"]);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_check_does_not_mutate() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();

        let state = tracked_state(dir.path());
        let before = state.clone();

        let checker = ConsistencyChecker::new(dir.path().to_path_buf());
        checker.check(&state).await.unwrap();

        assert_eq!(state, before);
    }
}
