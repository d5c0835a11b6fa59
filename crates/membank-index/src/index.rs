//! Embedding index: nearest-neighbor and literal substring search.

use crate::{ChunkIndexer, Chunk, Embedder, IndexError};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

/// One semantic search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matching chunk
    pub chunk: Chunk,
    /// Cosine similarity against the query vector
    pub score: f32,
}

/// Serves vector and exact queries over the chunks of one corpus.
///
/// Exact search needs no embeddings and works standalone; it is the
/// fallback mode when no provider is configured.
pub struct EmbeddingIndex {
    indexer: Arc<ChunkIndexer>,
    dimension: usize,
}

impl EmbeddingIndex {
    /// Create an index over the given chunk set.
    pub fn new(indexer: Arc<ChunkIndexer>, dimension: usize) -> Self {
        Self { indexer, dimension }
    }

    /// Compute embeddings for every chunk that lacks one.
    ///
    /// All vectors for the batch are computed before any is stored, so
    /// a provider failure leaves previously built vectors untouched.
    /// Returns the number of newly embedded chunks.
    pub async fn build(&self, embedder: &dyn Embedder) -> Result<usize, IndexError> {
        if embedder.dimension() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: embedder.dimension(),
            });
        }

        let pending = self.indexer.pending_texts();
        if pending.is_empty() {
            debug!("No chunks awaiting embeddings");
            return Ok(0);
        }

        let mut computed = Vec::with_capacity(pending.len());
        for (path, position, text) in pending {
            let vector = embedder.embed(&text).await?;
            if vector.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    got: vector.len(),
                });
            }
            computed.push((path, position, vector));
        }

        let count = computed.len();
        for (path, position, vector) in computed {
            self.indexer.set_embedding(&path, position, vector);
        }

        info!(embedded = count, "Embedding build complete");

        Ok(count)
    }

    /// Nearest-neighbor search by cosine similarity.
    ///
    /// Returns up to `k` chunks scoring at least `threshold`, highest
    /// first; ties break by document path then start offset so results
    /// are deterministic. An empty result is not an error.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }

        let mut hits: Vec<SearchHit> = self
            .indexer
            .all_chunks()
            .into_iter()
            .filter_map(|chunk| {
                let score = chunk
                    .embedding
                    .as_deref()
                    .map(|vector| cosine_similarity(query, vector))?;
                (score >= threshold).then_some(SearchHit { chunk, score })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk.path.cmp(&b.chunk.path))
                .then_with(|| a.chunk.start.cmp(&b.chunk.start))
        });
        hits.truncate(k);

        Ok(hits)
    }

    /// Literal substring search over raw chunk text.
    pub fn exact_search(&self, query: &str, case_sensitive: bool) -> Vec<Chunk> {
        let needle = if case_sensitive {
            query.to_string()
        } else {
            query.to_lowercase()
        };

        self.indexer
            .all_chunks()
            .into_iter()
            .filter(|chunk| {
                if case_sensitive {
                    chunk.text.contains(&needle)
                } else {
                    chunk.text.to_lowercase().contains(&needle)
                }
            })
            .collect()
    }
}

/// Cosine similarity of two equal-length vectors; 0.0 when either has
/// zero norm.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}
