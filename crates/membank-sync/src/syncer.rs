//! The synchronization pass state machine and auto-sync scheduler.
//!
//! A pass scans the corpus, diffs digests against the recorded state,
//! persists the updated state atomically, and optionally captures a
//! version. All mutating passes for one corpus serialize behind a
//! single lock; a concurrent caller blocks until the active pass
//! completes and then runs its own pass, which no-ops if the first
//! pass already captured the same disk state.

use crate::{ConsistencyChecker, ConsistencyReport, SnapshotStore, SyncError, SyncState, VersionMetadata};
use chrono::Utc;
use membank_core::{digest_file, list_documents, EngineConfig};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome classification of a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Nothing changed; no state was written, no version created
    NoOp,
    /// State persisted; version captured if versioning is enabled
    Synced,
    /// State persisted but the version capture failed
    SyncedSnapshotFailed,
}

/// Result of one sync pass.
#[derive(Debug, Clone)]
pub struct SyncResult {
    /// Paths added or modified in this pass
    pub changed: Vec<String>,
    /// Paths removed from tracking in this pass
    pub deleted: Vec<String>,
    /// Tracked paths whose digest was unchanged
    pub unchanged_count: usize,
    /// Version captured by this pass, if any
    pub version_id: Option<String>,
    /// How the pass ended
    pub status: SyncStatus,
}

struct AutoSync {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Orchestrates sync passes over one corpus.
pub struct Syncer {
    config: EngineConfig,
    store: SnapshotStore,
    checker: ConsistencyChecker,
    /// Serializes all mutating passes (sync, create, restore)
    pass_lock: Mutex<()>,
    /// Committed state; readers take cheap, possibly-stale views
    state: RwLock<SyncState>,
    auto: Mutex<Option<AutoSync>>,
}

impl Syncer {
    /// Open a syncer for the configured corpus, loading durable state.
    pub async fn open(config: EngineConfig) -> Result<Self, SyncError> {
        config.ensure_dirs()?;
        let state = SyncState::load(&config.state_file()).await?;
        let store = SnapshotStore::new(config.root.clone(), config.versions_dir(), config.compress);
        let checker = ConsistencyChecker::new(config.root.clone());

        Ok(Self {
            config,
            store,
            checker,
            pass_lock: Mutex::new(()),
            state: RwLock::new(state),
            auto: Mutex::new(None),
        })
    }

    /// A possibly-stale view of the committed sync state.
    pub fn state_snapshot(&self) -> SyncState {
        self.state.read().clone()
    }

    /// The snapshot store backing this syncer.
    pub fn snapshots(&self) -> &SnapshotStore {
        &self.store
    }

    /// Run one synchronization pass.
    ///
    /// A first run never short-circuits: the initial state is always
    /// persisted and every live file is reported as changed.
    pub async fn sync(&self, force: bool) -> Result<SyncResult, SyncError> {
        let _pass = self.pass_lock.lock().await;
        self.sync_pass(force).await
    }

    async fn sync_pass(&self, force: bool) -> Result<SyncResult, SyncError> {
        let recorded = self.state.read().clone();

        // Scanning: digest every live document
        let live = list_documents(&self.config.root)?;
        let mut current = BTreeMap::new();
        for rel in &live {
            let digest = digest_file(&self.config.root.join(rel)).await?;
            current.insert(rel.clone(), digest);
        }

        // Diffing against the recorded state
        let changed: Vec<String> = current
            .iter()
            .filter(|(rel, digest)| recorded.file_digests.get(*rel) != Some(digest))
            .map(|(rel, _)| rel.clone())
            .collect();
        let deleted: Vec<String> = recorded
            .file_digests
            .keys()
            .filter(|rel| !current.contains_key(*rel))
            .cloned()
            .collect();
        let unchanged_count = current.len() - changed.len();

        if changed.is_empty() && deleted.is_empty() && !force && !recorded.is_first_run() {
            debug!("No changes, skipping sync pass");
            return Ok(SyncResult {
                changed,
                deleted,
                unchanged_count,
                version_id: None,
                status: SyncStatus::NoOp,
            });
        }

        // Persisting: stage on a copy so the committed in-memory state
        // only advances once the new file is durable on disk
        let pass_time = Utc::now();
        let mut next = recorded;
        next.file_digests = current;
        next.sync_count += 1;
        next.last_sync = Some(pass_time);
        next.save(&self.config.state_file()).await?;

        let mut status = SyncStatus::Synced;
        let mut version_id = None;

        if self.config.auto_version {
            // The version shares the pass timestamp recorded in last_sync
            match self.store.create(Some(pass_time), next.last_version.clone()).await {
                Ok(metadata) => {
                    version_id = Some(metadata.id.clone());
                    next.last_version = Some(metadata.id);
                    next.save(&self.config.state_file()).await?;
                }
                Err(e) => {
                    // Digests already committed and reflect disk; only
                    // the version capture is degraded
                    warn!(error = %e, "Version capture failed");
                    status = SyncStatus::SyncedSnapshotFailed;
                }
            }
        }

        info!(
            changed = changed.len(),
            deleted = deleted.len(),
            unchanged = unchanged_count,
            sync_count = next.sync_count,
            version = version_id.as_deref().unwrap_or("-"),
            "Sync pass complete"
        );

        *self.state.write() = next;

        Ok(SyncResult {
            changed,
            deleted,
            unchanged_count,
            version_id,
            status,
        })
    }

    /// Capture a version explicitly, outside a sync pass.
    pub async fn create_version(&self) -> Result<VersionMetadata, SyncError> {
        let _pass = self.pass_lock.lock().await;

        let recorded = self.state.read().clone();
        let metadata = self.store.create(None, recorded.last_version.clone()).await?;

        let mut next = recorded;
        next.last_version = Some(metadata.id.clone());
        next.save(&self.config.state_file()).await?;
        *self.state.write() = next;

        Ok(metadata)
    }

    /// List available versions, newest first.
    pub async fn list_versions(&self) -> Result<Vec<VersionMetadata>, SyncError> {
        self.store.list().await
    }

    /// Restore the corpus to a version, then refresh recorded digests
    /// so state matches the restored disk contents.
    ///
    /// Refuses with [`SyncError::UncommittedChanges`] when unsynced
    /// edits would be overwritten, unless `force` is set.
    pub async fn restore_version(
        &self,
        id: &str,
        force: bool,
    ) -> Result<VersionMetadata, SyncError> {
        let _pass = self.pass_lock.lock().await;

        let recorded = self.state.read().clone();
        let metadata = self.store.restore(id, &recorded.file_digests, force).await?;

        // Disk changed underneath the recorded state; re-digest
        let live = list_documents(&self.config.root)?;
        let mut next = recorded;
        next.file_digests.clear();
        for rel in live {
            let digest = digest_file(&self.config.root.join(&rel)).await?;
            next.file_digests.insert(rel, digest);
        }
        next.last_sync = Some(Utc::now());
        next.save(&self.config.state_file()).await?;
        *self.state.write() = next;

        info!(version = %id, "State refreshed after restore");

        Ok(metadata)
    }

    /// Run a read-only consistency check against the committed state.
    pub async fn check(&self) -> Result<ConsistencyReport, SyncError> {
        let state = self.state_snapshot();
        self.checker.check(&state).await
    }

    /// Start the background auto-sync scheduler.
    ///
    /// Idempotent: a second start while running is a no-op. The first
    /// pass runs immediately, then repeats at the configured interval.
    /// Pass failures are logged and retried on the next tick; they
    /// never propagate out of the scheduler task.
    pub async fn start_auto_sync(self: &Arc<Self>) {
        let mut auto = self.auto.lock().await;
        if auto.is_some() {
            warn!("Auto-sync already running");
            return;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let syncer = Arc::clone(self);
        let period = Duration::from_secs(self.config.auto_sync_interval_mins * 60);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match syncer.sync(false).await {
                            Ok(result) => {
                                debug!(status = ?result.status, changed = result.changed.len(), "Auto-sync pass");
                            }
                            Err(e) => {
                                warn!(error = %e, "Auto-sync pass failed, retrying next tick");
                            }
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        *auto = Some(AutoSync { stop_tx, task });

        info!(
            interval_mins = self.config.auto_sync_interval_mins,
            "Auto-sync started"
        );
    }

    /// Stop the scheduler, waiting for any in-flight pass to finish.
    pub async fn stop_auto_sync(&self) {
        let handle = self.auto.lock().await.take();

        match handle {
            Some(AutoSync { stop_tx, task }) => {
                let _ = stop_tx.send(true);
                // The task only exits between passes, so an in-flight
                // pass runs to natural completion before this returns
                let _ = task.await;
                info!("Auto-sync stopped");
            }
            None => {
                warn!("Auto-sync not running");
            }
        }
    }
}
