//! Section-boundary document chunker.
//!
//! Splits document text into [`Chunk`]s aligned to Markdown heading
//! lines. Sections exceeding the configured maximum are split further
//! at whitespace boundaries to avoid mid-word cuts; residue below the
//! minimum size is dropped. Identical content always yields identical
//! chunk boundaries.

use crate::IndexError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Size bounds for chunking, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct ChunkLimits {
    /// Maximum chunk size; longer sections are split
    pub max_size: usize,
    /// Minimum chunk size; smaller residue is dropped
    pub min_size: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            max_size: 1000,
            min_size: 100,
        }
    }
}

/// A contiguous slice of one document, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Owning document path (relative to the corpus root)
    pub path: String,
    /// Start byte offset into the document
    pub start: usize,
    /// End byte offset into the document (exclusive)
    pub end: usize,
    /// Title of the enclosing section, if any
    pub section: Option<String>,
    /// The chunk text itself
    pub text: String,
    /// When this chunk was last (re)indexed
    pub last_updated: DateTime<Utc>,
    /// Embedding vector, absent until computed
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

struct Section {
    title: Option<String>,
    body_start: usize,
    body_end: usize,
}

/// Split document text into section-aligned chunks.
pub fn chunk_document(path: &str, text: &str, limits: &ChunkLimits) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for section in extract_sections(text) {
        push_spans(
            &mut chunks,
            path,
            text,
            section.body_start,
            section.body_end,
            section.title.as_deref(),
            limits,
            true,
        );
    }

    // A document whose every section falls below the minimum still
    // gets one chunk rather than vanishing from the index
    if chunks.is_empty() {
        push_spans(&mut chunks, path, text, 0, text.len(), None, limits, false);
    }

    chunks
}

/// Split `[start, end)` into chunks respecting the limits, trimming
/// surrounding whitespace and splitting oversize spans at the nearest
/// whitespace boundary below the maximum.
#[allow(clippy::too_many_arguments)]
fn push_spans(
    chunks: &mut Vec<Chunk>,
    path: &str,
    text: &str,
    start: usize,
    end: usize,
    section: Option<&str>,
    limits: &ChunkLimits,
    enforce_min: bool,
) {
    let min_size = if enforce_min { limits.min_size } else { 1 };
    let mut piece_start = start;

    while piece_start < end {
        let (s, remaining_end) = trim_span(text, piece_start, end);
        if s >= remaining_end {
            break;
        }

        if remaining_end - s <= limits.max_size {
            let (s, e) = trim_span(text, s, remaining_end);
            if e - s >= min_size {
                chunks.push(make_chunk(path, text, s, e, section));
            }
            break;
        }

        let window_end = floor_char_boundary(text, s + limits.max_size);
        let split = text[s..window_end]
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(pos, c)| s + pos + c.len_utf8())
            .unwrap_or(window_end);
        // A limit narrower than the first character would pin the
        // window at the span start; advance by one whole character
        let split = if split > s {
            split
        } else {
            ceil_char_boundary(text, s + 1)
        };

        let (ps, pe) = trim_span(text, s, split);
        if pe - ps >= min_size {
            chunks.push(make_chunk(path, text, ps, pe, section));
        }
        piece_start = split;
    }
}

/// Extract sections bounded by Markdown heading lines (`#` .. `######`).
///
/// Text before the first heading forms an untitled preamble section;
/// each heading owns the body up to the next heading.
fn extract_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut title: Option<String> = None;
    let mut body_start = 0usize;
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        if let Some(heading) = heading_title(line.trim_end()) {
            sections.push(Section {
                title: title.take(),
                body_start,
                body_end: offset,
            });
            title = Some(heading);
            body_start = offset + line.len();
        }
        offset += line.len();
    }

    sections.push(Section {
        title,
        body_start,
        body_end: text.len(),
    });

    sections
}

fn heading_title(line: &str) -> Option<String> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let rest = line[hashes..].strip_prefix(' ')?;
    let title = rest.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

fn trim_span(text: &str, start: usize, end: usize) -> (usize, usize) {
    let slice = &text[start..end];
    let front = slice.len() - slice.trim_start().len();
    let back = slice.len() - slice.trim_end().len();
    (start + front, end - back)
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

fn make_chunk(path: &str, text: &str, start: usize, end: usize, section: Option<&str>) -> Chunk {
    Chunk {
        path: path.to_string(),
        start,
        end,
        section: section.map(|s| s.to_string()),
        text: text[start..end].to_string(),
        last_updated: Utc::now(),
        embedding: None,
    }
}

/// Maintains the chunk set per document and persists it to disk.
///
/// Reindexing a document builds the full replacement set before the
/// old chunks are swapped out, so a document is never observably left
/// with zero chunks mid-reindex.
pub struct ChunkIndexer {
    limits: ChunkLimits,
    chunks: RwLock<BTreeMap<String, Vec<Chunk>>>,
}

impl ChunkIndexer {
    /// Create an empty indexer with the given size limits.
    pub fn new(limits: ChunkLimits) -> Self {
        Self {
            limits,
            chunks: RwLock::new(BTreeMap::new()),
        }
    }

    /// Re-chunk one document, replacing all its prior chunks.
    pub fn reindex(&self, path: &str, text: &str) -> usize {
        let replacement = chunk_document(path, text, &self.limits);
        let count = replacement.len();

        self.chunks.write().insert(path.to_string(), replacement);

        debug!(path = %path, chunks = count, "Reindexed document");
        count
    }

    /// Drop all chunks for a document.
    pub fn remove(&self, path: &str) {
        self.chunks.write().remove(path);
    }

    /// Drop chunks for every document not in `keep`.
    pub fn retain_paths(&self, keep: &[String]) {
        self.chunks.write().retain(|path, _| keep.contains(path));
    }

    /// Chunks for one document, in offset order.
    pub fn document_chunks(&self, path: &str) -> Vec<Chunk> {
        self.chunks.read().get(path).cloned().unwrap_or_default()
    }

    /// All chunks, ordered by document path then start offset.
    pub fn all_chunks(&self) -> Vec<Chunk> {
        self.chunks
            .read()
            .values()
            .flat_map(|chunks| chunks.iter().cloned())
            .collect()
    }

    /// Total chunk count across all documents.
    pub fn len(&self) -> usize {
        self.chunks.read().values().map(Vec::len).sum()
    }

    /// Whether the index holds no chunks at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Texts of chunks that do not have an embedding yet, addressed by
    /// (path, position).
    pub(crate) fn pending_texts(&self) -> Vec<(String, usize, String)> {
        let mut pending = Vec::new();
        for (path, chunks) in self.chunks.read().iter() {
            for (i, chunk) in chunks.iter().enumerate() {
                if chunk.embedding.is_none() {
                    pending.push((path.clone(), i, chunk.text.clone()));
                }
            }
        }
        pending
    }

    /// Attach an embedding to the chunk at (path, position).
    pub(crate) fn set_embedding(&self, path: &str, position: usize, vector: Vec<f32>) {
        if let Some(chunk) = self
            .chunks
            .write()
            .get_mut(path)
            .and_then(|chunks| chunks.get_mut(position))
        {
            chunk.embedding = Some(vector);
        }
    }

    /// Persist the index to `dir` as `chunks.json` plus
    /// `embeddings.json`, each written atomically.
    pub async fn save(&self, dir: &Path) -> Result<(), IndexError> {
        tokio::fs::create_dir_all(dir).await?;

        let (chunks_json, embeddings_json) = {
            let map = self.chunks.read();
            let embeddings: BTreeMap<String, Vec<Option<Vec<f32>>>> = map
                .iter()
                .map(|(path, chunks)| {
                    (
                        path.clone(),
                        chunks.iter().map(|c| c.embedding.clone()).collect(),
                    )
                })
                .collect();
            (
                serde_json::to_string_pretty(&*map)?,
                serde_json::to_string(&embeddings)?,
            )
        };

        for (name, json) in [("chunks.json", chunks_json), ("embeddings.json", embeddings_json)] {
            let temp_path = dir.join(format!(".{name}.tmp"));
            tokio::fs::write(&temp_path, &json).await?;
            tokio::fs::rename(&temp_path, dir.join(name)).await?;
        }

        debug!(dir = ?dir, documents = self.chunks.read().len(), "Saved index");

        Ok(())
    }

    /// Load a previously saved index from `dir`.
    ///
    /// Returns `false` when no index has been saved there yet.
    pub async fn load(&self, dir: &Path) -> Result<bool, IndexError> {
        let chunks_path = dir.join("chunks.json");
        if !chunks_path.exists() {
            return Ok(false);
        }

        let json = tokio::fs::read_to_string(&chunks_path).await?;
        let mut map: BTreeMap<String, Vec<Chunk>> = serde_json::from_str(&json)?;

        let embeddings_path = dir.join("embeddings.json");
        if embeddings_path.exists() {
            let json = tokio::fs::read_to_string(&embeddings_path).await?;
            let embeddings: BTreeMap<String, Vec<Option<Vec<f32>>>> = serde_json::from_str(&json)?;

            for (path, vectors) in embeddings {
                if let Some(chunks) = map.get_mut(&path) {
                    if chunks.len() == vectors.len() {
                        for (chunk, vector) in chunks.iter_mut().zip(vectors) {
                            chunk.embedding = vector;
                        }
                    }
                }
            }
        }

        debug!(dir = ?dir, documents = map.len(), "Loaded index");

        *self.chunks.write() = map;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn limits(max: usize, min: usize) -> ChunkLimits {
        ChunkLimits {
            max_size: max,
            min_size: min,
        }
    }

    #[test]
    fn test_sections_split_on_headings() {
        let text = "# Alpha\n\nalpha body text here\n\n## Beta\n\nbeta body text here\n";
        let chunks = chunk_document("doc.md", text, &limits(1000, 5));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section.as_deref(), Some("Alpha"));
        assert_eq!(chunks[0].text, "alpha body text here");
        assert_eq!(chunks[1].section.as_deref(), Some("Beta"));
        assert_eq!(chunks[1].text, "beta body text here");
    }

    #[test]
    fn test_preamble_has_no_section() {
        let text = "intro before any heading, long enough\n\n# First\n\nsection body here\n";
        let chunks = chunk_document("doc.md", text, &limits(1000, 5));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section, None);
        assert!(chunks[0].text.starts_with("intro"));
    }

    #[test]
    fn test_offsets_point_into_document() {
        let text = "# Title\n\nbody content of the section\n";
        let chunks = chunk_document("doc.md", text, &limits(1000, 5));

        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(&text[chunk.start..chunk.end], chunk.text);
    }

    #[test]
    fn test_oversize_section_splits_at_whitespace() {
        let word = "word ";
        let body: String = word.repeat(100); // 500 bytes
        let text = format!("# Big\n\n{body}");
        let chunks = chunk_document("doc.md", &text, &limits(120, 10));

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.len() <= 120);
            // No mid-word cuts: every chunk is whole words
            assert!(chunk.text.split(' ').all(|w| w == "word" || w.is_empty()));
            assert_eq!(&text[chunk.start..chunk.end], chunk.text);
        }
    }

    #[test]
    fn test_short_residue_dropped() {
        let text = "# Tiny\n\nok\n\n# Long\n\nthis section body is comfortably long enough\n";
        let chunks = chunk_document("doc.md", text, &limits(1000, 10));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section.as_deref(), Some("Long"));
    }

    #[test]
    fn test_all_small_document_still_chunks() {
        let text = "# A\n\nhi\n";
        let chunks = chunk_document("doc.md", text, &limits(1000, 100));

        // Would yield nothing under the minimum; falls back to one chunk
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_empty_document_yields_no_chunks() {
        assert!(chunk_document("doc.md", "", &limits(1000, 100)).is_empty());
        assert!(chunk_document("doc.md", "  \n\n  ", &limits(1000, 100)).is_empty());
    }

    #[test]
    fn test_deterministic_boundaries() {
        let text = "# One\n\nfirst section body right here\n\n# Two\n\nsecond section body over there\n";
        let a = chunk_document("doc.md", text, &limits(40, 5));
        let b = chunk_document("doc.md", text, &limits(40, 5));

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!((x.start, x.end), (y.start, y.end));
            assert_eq!(x.text, y.text);
            assert_eq!(x.section, y.section);
        }
    }

    #[test]
    fn test_unicode_content_is_boundary_safe() {
        let body = "\u{4e16}\u{754c} ".repeat(50);
        let text = format!("# Unicode\n\n{body}");
        let chunks = chunk_document("doc.md", &text, &limits(50, 4));

        for chunk in &chunks {
            assert_eq!(&text[chunk.start..chunk.end], chunk.text);
        }
    }

    #[test]
    fn test_limit_narrower_than_one_char_still_advances() {
        // Each character is 3 bytes, wider than the 2-byte limit, and
        // there is no whitespace to split at
        let text = "# U\n\n\u{4e16}\u{754c}\u{548c}\u{5e73}\n";
        let chunks = chunk_document("doc.md", text, &limits(2, 1));

        assert_eq!(chunks.len(), 4);
        for chunk in &chunks {
            assert_eq!(&text[chunk.start..chunk.end], chunk.text);
            assert_eq!(chunk.text.chars().count(), 1);
        }
    }

    #[test]
    fn test_hash_line_without_space_is_not_heading() {
        let text = "#hashtag is not a heading, just ordinary text content\n";
        let chunks = chunk_document("doc.md", text, &limits(1000, 10));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, None);
    }

    #[test]
    fn test_reindex_replaces_chunks() {
        let indexer = ChunkIndexer::new(limits(1000, 5));

        indexer.reindex("doc.md", "# A\n\nfirst version body\n\n# B\n\nsecond part here\n");
        assert_eq!(indexer.document_chunks("doc.md").len(), 2);

        indexer.reindex("doc.md", "# Only\n\nreplacement body text\n");
        let chunks = indexer.document_chunks("doc.md");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section.as_deref(), Some("Only"));
    }

    #[test]
    fn test_remove_and_retain() {
        let indexer = ChunkIndexer::new(limits(1000, 2));
        indexer.reindex("a.md", "alpha body text\n");
        indexer.reindex("b.md", "beta body text\n");
        indexer.reindex("c.md", "gamma body text\n");

        indexer.remove("b.md");
        assert!(indexer.document_chunks("b.md").is_empty());

        indexer.retain_paths(&["a.md".to_string()]);
        assert_eq!(indexer.len(), 1);
        assert!(indexer.document_chunks("c.md").is_empty());
    }

    #[test]
    fn test_all_chunks_ordered() {
        let indexer = ChunkIndexer::new(limits(30, 2));
        indexer.reindex("b.md", "# B\n\nsome second document text body\n");
        indexer.reindex("a.md", "# A\n\nsome first document text body\n");

        let all = indexer.all_chunks();
        let paths: Vec<&str> = all.iter().map(|c| c.path.as_str()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let indexer = ChunkIndexer::new(limits(1000, 2));
        indexer.reindex("doc.md", "# Section\n\npersisted body text\n");
        indexer.set_embedding("doc.md", 0, vec![0.5, 0.5]);

        indexer.save(dir.path()).await.unwrap();

        let restored = ChunkIndexer::new(limits(1000, 2));
        assert!(restored.load(dir.path()).await.unwrap());

        let chunks = restored.document_chunks("doc.md");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "persisted body text");
        assert_eq!(chunks[0].embedding.as_deref(), Some(&[0.5, 0.5][..]));
    }

    #[tokio::test]
    async fn test_load_absent_index() {
        let dir = tempdir().unwrap();
        let indexer = ChunkIndexer::new(ChunkLimits::default());
        assert!(!indexer.load(dir.path()).await.unwrap());
    }
}
