//! The per-corpus engine facade.

use crate::EngineError;
use membank_core::{decode_text, list_documents, EngineConfig};
use membank_index::{
    Chunk, ChunkIndexer, ChunkLimits, Embedder, EmbeddingIndex, SearchHit,
};
use membank_sync::{ConsistencyReport, SyncResult, Syncer, VersionMetadata};
use std::sync::Arc;
use tracing::info;

/// One memory bank: a tracked corpus of markdown documents with
/// versioned synchronization and a retrieval index over its chunks.
///
/// Construct one instance per corpus root; instances are independent
/// and there is no process-wide registry. All methods take `&self` and
/// the engine is safe to share behind an [`Arc`].
pub struct MemoryBank {
    config: EngineConfig,
    syncer: Arc<Syncer>,
    chunks: Arc<ChunkIndexer>,
    index: EmbeddingIndex,
}

impl MemoryBank {
    /// Open an engine over the configured corpus root.
    ///
    /// Creates the bookkeeping directories, loads durable sync state,
    /// and reloads any previously persisted chunk index.
    pub async fn open(config: EngineConfig) -> Result<Self, EngineError> {
        let syncer = Arc::new(Syncer::open(config.clone()).await?);

        let limits = ChunkLimits {
            max_size: config.max_chunk_size,
            min_size: config.min_chunk_size,
        };
        let chunks = Arc::new(ChunkIndexer::new(limits));
        let reloaded = chunks.load(&config.index_dir()).await?;

        info!(
            root = ?config.root,
            index_reloaded = reloaded,
            "Opened memory bank"
        );

        let index = EmbeddingIndex::new(Arc::clone(&chunks), config.embedding_dim);

        Ok(Self {
            config,
            syncer,
            chunks,
            index,
        })
    }

    /// The configuration this engine was opened with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one synchronization pass. See [`Syncer::sync`].
    pub async fn sync(&self, force: bool) -> Result<SyncResult, EngineError> {
        Ok(self.syncer.sync(force).await?)
    }

    /// Start the background auto-sync scheduler.
    pub async fn start_auto_sync(&self) {
        self.syncer.start_auto_sync().await;
    }

    /// Stop the scheduler, waiting for an in-flight pass to finish.
    pub async fn stop_auto_sync(&self) {
        self.syncer.stop_auto_sync().await;
    }

    /// Capture a version snapshot of the current corpus.
    pub async fn create_version(&self) -> Result<VersionMetadata, EngineError> {
        Ok(self.syncer.create_version().await?)
    }

    /// List available versions, newest first.
    pub async fn list_versions(&self) -> Result<Vec<VersionMetadata>, EngineError> {
        Ok(self.syncer.list_versions().await?)
    }

    /// Restore the corpus to a previous version.
    ///
    /// Recorded digests are refreshed from the restored disk contents,
    /// so a subsequent [`check`](Self::check) comes back clean. The
    /// retrieval index is not rebuilt automatically; call
    /// [`reindex_all`](Self::reindex_all) to refresh it.
    pub async fn restore_version(
        &self,
        id: &str,
        force: bool,
    ) -> Result<VersionMetadata, EngineError> {
        Ok(self.syncer.restore_version(id, force).await?)
    }

    /// Run a read-only consistency check against recorded state.
    pub async fn check(&self) -> Result<ConsistencyReport, EngineError> {
        Ok(self.syncer.check().await?)
    }

    /// Re-chunk every tracked document and persist the index.
    ///
    /// Documents no longer on disk are dropped from the index.
    /// Reindexed documents come back with embeddings pending until the
    /// next [`build_embeddings`](Self::build_embeddings) call. Returns
    /// the number of documents indexed.
    pub async fn reindex_all(&self) -> Result<usize, EngineError> {
        let live = list_documents(&self.config.root)?;

        for rel in &live {
            let path = self.config.root.join(rel);
            let bytes = tokio::fs::read(&path).await?;
            let text = decode_text(&path, bytes)?;
            self.chunks.reindex(rel, &text);
        }
        self.chunks.retain_paths(&live);

        self.chunks.save(&self.config.index_dir()).await?;

        info!(
            documents = live.len(),
            chunks = self.chunks.len(),
            "Corpus reindexed"
        );

        Ok(live.len())
    }

    /// Embed every chunk that lacks a vector, then persist the index.
    ///
    /// Returns the number of newly embedded chunks.
    pub async fn build_embeddings(&self, embedder: &dyn Embedder) -> Result<usize, EngineError> {
        let embedded = self.index.build(embedder).await?;
        if embedded > 0 {
            self.chunks.save(&self.config.index_dir()).await?;
        }
        Ok(embedded)
    }

    /// Semantic search by cosine similarity.
    ///
    /// When `threshold` is `None` the configured default applies.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>, EngineError> {
        let threshold = threshold.unwrap_or(self.config.similarity_threshold);
        Ok(self.index.search(query, k, threshold)?)
    }

    /// Literal substring search over indexed chunk text.
    ///
    /// Works without any embeddings configured.
    pub fn exact_search(&self, query: &str, case_sensitive: bool) -> Vec<Chunk> {
        self.index.exact_search(query, case_sensitive)
    }
}
