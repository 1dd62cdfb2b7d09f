//! In-memory embedding index with brute-force cosine similarity search.
//!
//! All searches are O(n) over stored vectors, which is fine for the corpus
//! size of a single writing project.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use lore_core::{Chunk, ChunkId};

use crate::embedding::Embedder;

/// A single hit returned from a vector search.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub chunk: Arc<Chunk>,
    /// Cosine similarity score.
    pub score: f64,
    /// First-insertion sequence of the chunk.
    pub seq: u64,
}

/// An entry stored in the index. `vector` is `None` when embedding failed
/// or no embedder was available; such entries never match.
#[derive(Debug, Clone)]
struct EmbeddedEntry {
    chunk: Arc<Chunk>,
    vector: Option<Arc<[f32]>>,
    seq: u64,
}

/// Chunk -> vector store.
#[derive(Debug)]
pub struct EmbeddingIndex {
    entries: HashMap<ChunkId, EmbeddedEntry>,
    next_seq: u64,
    min_score: f64,
}

impl EmbeddingIndex {
    pub fn new(min_score: f64) -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
            min_score,
        }
    }

    /// Insert with an already computed vector. Replacing keeps the original
    /// sequence.
    pub fn insert(&mut self, chunk: Arc<Chunk>, vector: Option<Vec<f32>>) {
        let seq = match self.entries.get(&chunk.id) {
            Some(existing) => existing.seq,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                seq
            }
        };
        self.entries.insert(
            chunk.id.clone(),
            EmbeddedEntry {
                chunk,
                vector: vector.map(Arc::from),
                seq,
            },
        );
    }

    /// Delete an entry. Returns whether it existed.
    pub fn remove(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Search for the k nearest chunks to the query vector.
    ///
    /// Only vectors of the query's dimensionality are compared; scores at or
    /// below the floor are dropped. Ties keep first-insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SemanticHit> {
        if k == 0 || query.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<SemanticHit> = self
            .entries
            .values()
            .filter_map(|entry| {
                let vector = entry.vector.as_ref()?;
                if vector.len() != query.len() {
                    return None;
                }
                let score = cosine_similarity(query, vector);
                (score > self.min_score).then(|| SemanticHit {
                    chunk: Arc::clone(&entry.chunk),
                    score,
                    seq: entry.seq,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.seq.cmp(&b.seq)));
        scored.truncate(k);
        scored
    }

    /// Return the number of chunks stored in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return true if the index contains no chunks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of chunks that actually carry a vector.
    pub fn embedded_count(&self) -> usize {
        self.entries.values().filter(|e| e.vector.is_some()).count()
    }

    /// Dimensionality of the earliest stored vector, if any.
    pub fn dimensions(&self) -> Option<usize> {
        self.entries
            .values()
            .filter_map(|e| e.vector.as_ref().map(|v| (e.seq, v.len())))
            .min_by_key(|(seq, _)| *seq)
            .map(|(_, len)| len)
    }
}

impl Default for EmbeddingIndex {
    fn default() -> Self {
        Self::new(0.3)
    }
}

/// Vector for `chunk`: its precomputed embedding if present, otherwise one
/// computed from at most `char_limit` leading characters of its text.
///
/// Independent of any index so callers can embed outside a lock.
pub fn embed_chunk(chunk: &Chunk, embedder: &Embedder, char_limit: usize) -> Option<Vec<f32>> {
    if let Some(vector) = chunk.embedding.as_ref().filter(|v| !v.is_empty()) {
        return Some(vector.clone());
    }
    let vector = embedder.try_embed(truncate_chars(&chunk.text, char_limit));
    if vector.is_none() && embedder.is_available() {
        debug!(chunk_id = %chunk.id, "chunk left without a vector");
    }
    vector
}

/// First `limit` characters of `text`, on a char boundary.
fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if the lengths differ or either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use lore_core::error::Result;

    use super::*;
    use crate::embedding::{EmbeddingService, MockEmbedding};

    fn chunk(id: &str, text: &str) -> Arc<Chunk> {
        Arc::new(Chunk::new(id, text, "place", id))
    }

    /// Embed the way the engine does, then insert.
    fn embed_into(index: &mut EmbeddingIndex, chunk: Arc<Chunk>, embedder: &Embedder) {
        let vector = embed_chunk(&chunk, embedder, 2000);
        index.insert(chunk, vector);
    }

    /// Records the text it was asked to embed.
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    impl EmbeddingService for Recording {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.seen.lock().unwrap().push(text.to_string());
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_insert_and_search() {
        let mut index = EmbeddingIndex::default();
        index.insert(chunk("a", "alpha"), Some(vec![1.0, 0.0, 0.0]));
        index.insert(chunk("b", "beta"), Some(vec![0.8, 0.6, 0.0]));
        index.insert(chunk("c", "gamma"), Some(vec![0.0, 0.0, 1.0]));

        let hits = index.search(&[1.0, 0.0, 0.0], 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.id, "a");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].chunk.id, "b");
        assert!((hits[1].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_search_empty_index() {
        let index = EmbeddingIndex::default();
        assert!(index.search(&[1.0f32; 384], 10).is_empty());
    }

    #[test]
    fn test_dimension_mismatch_never_matches() {
        let mut index = EmbeddingIndex::default();
        index.insert(chunk("a", "alpha"), Some(vec![1.0, 0.0]));
        index.insert(chunk("b", "beta"), Some(vec![1.0, 0.0, 0.0]));

        let hits = index.search(&[1.0, 0.0, 0.0], 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.id, "b");
        assert_eq!(index.dimensions(), Some(2));
    }

    #[test]
    fn test_vectorless_entries_are_kept_but_skipped() {
        let mut index = EmbeddingIndex::default();
        embed_into(&mut index, chunk("a", "alpha"), &Embedder::Unavailable);
        assert_eq!(index.len(), 1);
        assert_eq!(index.embedded_count(), 0);
        assert!(index.search(&[1.0, 0.0], 10).is_empty());
    }

    #[test]
    fn test_precomputed_embedding_wins() {
        let service = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let embedder = Embedder::Available(service.clone());
        let mut index = EmbeddingIndex::default();

        let precomputed = Chunk::new("a", "alpha", "place", "a").with_embedding(vec![0.0, 1.0]);
        embed_into(&mut index, Arc::new(precomputed), &embedder);

        assert!(service.seen.lock().unwrap().is_empty());
        assert_eq!(index.search(&[0.0, 1.0], 1)[0].chunk.id, "a");
    }

    #[test]
    fn test_embed_input_is_char_limited() {
        let service = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let embedder = Embedder::Available(service.clone());
        let vector = embed_chunk(&chunk("a", "éééééééé"), &embedder, 5);
        assert!(vector.is_some());
        assert_eq!(service.seen.lock().unwrap()[0], "ééééé");
    }

    #[test]
    fn test_mock_embedding_self_similarity() {
        let embedder = Embedder::available(MockEmbedding::new());
        let mut index = EmbeddingIndex::default();
        embed_into(&mut index, chunk("a", "The dragon flew over the castle"), &embedder);
        embed_into(&mut index, chunk("b", "Dragons breathe fire"), &embedder);

        let query = embedder.try_embed("The dragon flew over the castle").unwrap();
        let hits = index.search(&query, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.id, "a");
    }

    #[test]
    fn test_remove_and_clear() {
        let mut index = EmbeddingIndex::default();
        index.insert(chunk("a", "alpha"), Some(vec![1.0]));
        index.insert(chunk("b", "beta"), Some(vec![1.0]));

        assert!(index.remove("a"));
        assert!(!index.remove("a"));
        assert_eq!(index.len(), 1);

        index.clear();
        assert!(index.is_empty());
    }

    #[test]
    fn test_cosine_similarity_properties() {
        let a = [0.2f32, 0.4, 0.1];
        let b = [0.3f32, 0.1, 0.9];
        let ab = cosine_similarity(&a, &b);
        assert!((ab - cosine_similarity(&b, &a)).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&ab));
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }
}
