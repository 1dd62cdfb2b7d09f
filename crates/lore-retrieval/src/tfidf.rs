//! Lexical TF-IDF index with lazily rebuilt, immutable generations.
//!
//! Mutations only touch the document table and mark the index dirty. The
//! next query rebuilds the document-frequency table into a fresh
//! [`Generation`] and swaps it in behind an `Arc`, so a query that already
//! holds a snapshot keeps scoring against consistent weights.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use lore_core::{Chunk, ChunkId};

use crate::tokenizer::{term_frequency, tokenize};

/// Sparse term -> weight vector.
pub type SparseVector = HashMap<String, f64>;

/// A chunk as held by the index between rebuilds.
#[derive(Debug, Clone)]
struct IndexedDoc {
    chunk: Arc<Chunk>,
    tf: SparseVector,
    seq: u64,
}

/// One chunk's weighted vector inside a generation.
#[derive(Debug, Clone)]
struct WeightedDoc {
    chunk: Arc<Chunk>,
    seq: u64,
    weights: SparseVector,
    magnitude: f64,
}

/// A lexical match.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub chunk: Arc<Chunk>,
    pub score: f64,
    /// Query terms present in the chunk, in query order.
    pub matched_terms: Vec<String>,
    /// First-insertion sequence of the chunk, used to break score ties.
    pub seq: u64,
}

/// Immutable snapshot of the weight tables.
#[derive(Debug, Default)]
pub struct Generation {
    number: u64,
    idf: HashMap<String, f64>,
    doc_freq: HashMap<String, usize>,
    docs: Vec<WeightedDoc>,
}

impl Generation {
    fn build(number: u64, docs: &HashMap<ChunkId, IndexedDoc>) -> Self {
        let total = docs.len() as f64;

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in docs.values() {
            for term in doc.tf.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }

        let idf: HashMap<String, f64> = doc_freq
            .iter()
            .map(|(term, &df)| {
                let weight = ((total + 1.0) / (df as f64 + 1.0)).ln() + 1.0;
                (term.clone(), weight)
            })
            .collect();

        let mut weighted: Vec<WeightedDoc> = docs
            .values()
            .map(|doc| {
                let weights: SparseVector = doc
                    .tf
                    .iter()
                    .map(|(term, tf)| (term.clone(), tf * idf.get(term).copied().unwrap_or(0.0)))
                    .collect();
                let magnitude = magnitude(&weights);
                WeightedDoc {
                    chunk: Arc::clone(&doc.chunk),
                    seq: doc.seq,
                    weights,
                    magnitude,
                }
            })
            .collect();
        weighted.sort_by_key(|doc| doc.seq);

        Self {
            number,
            idf,
            doc_freq,
            docs: weighted,
        }
    }

    /// Monotonically increasing generation number; 0 before the first build.
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    pub fn document_count(&self) -> usize {
        self.docs.len()
    }

    /// Number of documents containing `term` (already tokenized form).
    pub fn document_frequency(&self, term: &str) -> usize {
        self.doc_freq.get(term).copied().unwrap_or(0)
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    /// Score every document against `query` and return the best `k` above
    /// `min_score`, ties kept in first-insertion order.
    pub fn search(&self, query: &str, k: usize, min_score: f64) -> Vec<LexicalHit> {
        if k == 0 || self.docs.is_empty() {
            return Vec::new();
        }

        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let query_vector: SparseVector = term_frequency(&query_tokens)
            .into_iter()
            .map(|(term, tf)| {
                let weight = tf * self.idf.get(&term).copied().unwrap_or(0.0);
                (term, weight)
            })
            .collect();
        let query_magnitude = magnitude(&query_vector);

        let mut unique_terms: Vec<&String> = Vec::new();
        let mut seen = HashSet::new();
        for token in &query_tokens {
            if seen.insert(token) {
                unique_terms.push(token);
            }
        }

        let mut hits: Vec<LexicalHit> = self
            .docs
            .iter()
            .filter_map(|doc| {
                let score = sparse_cosine(&query_vector, query_magnitude, &doc.weights, doc.magnitude);
                if score <= min_score {
                    return None;
                }
                let matched_terms = unique_terms
                    .iter()
                    .filter(|term| doc.weights.contains_key(term.as_str()))
                    .map(|term| (*term).clone())
                    .collect();
                Some(LexicalHit {
                    chunk: Arc::clone(&doc.chunk),
                    score,
                    matched_terms,
                    seq: doc.seq,
                })
            })
            .collect();

        // docs are already in seq order and the sort is stable.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        hits
    }
}

/// TF-IDF index over chunk text.
#[derive(Debug)]
pub struct TfIdfIndex {
    docs: HashMap<ChunkId, IndexedDoc>,
    current: Arc<Generation>,
    dirty: bool,
    next_seq: u64,
    min_score: f64,
}

impl TfIdfIndex {
    pub fn new(min_score: f64) -> Self {
        Self {
            docs: HashMap::new(),
            current: Arc::new(Generation::default()),
            dirty: false,
            next_seq: 0,
            min_score,
        }
    }

    /// Add or replace a chunk. A replaced chunk keeps its original sequence.
    pub fn add(&mut self, chunk: Arc<Chunk>) {
        let tf = term_frequency(&tokenize(&chunk.text));
        let seq = match self.docs.get(&chunk.id) {
            Some(existing) => existing.seq,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                seq
            }
        };
        debug!(chunk_id = %chunk.id, terms = tf.len(), "tf-idf add");
        self.docs.insert(chunk.id.clone(), IndexedDoc { chunk, tf, seq });
        self.dirty = true;
    }

    /// Remove a chunk. Returns whether it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.docs.remove(id).is_some();
        if removed {
            self.dirty = true;
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.docs.is_empty() {
            self.docs.clear();
            self.dirty = true;
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Chunk>> {
        self.docs.get(id).map(|doc| &doc.chunk)
    }

    /// Every indexed chunk, in no particular order.
    pub fn chunks(&self) -> impl Iterator<Item = &Arc<Chunk>> {
        self.docs.values().map(|doc| &doc.chunk)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Whether a mutation happened since the last rebuild.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    /// The current generation, possibly stale if the index is dirty.
    pub fn snapshot(&self) -> Arc<Generation> {
        Arc::clone(&self.current)
    }

    /// Rebuild if dirty and return the up-to-date generation.
    pub fn refresh(&mut self) -> Arc<Generation> {
        if self.dirty {
            let number = self.current.number + 1;
            let generation = Generation::build(number, &self.docs);
            debug!(
                generation = number,
                documents = generation.document_count(),
                vocabulary = generation.vocabulary_size(),
                "tf-idf generation rebuilt"
            );
            self.current = Arc::new(generation);
            self.dirty = false;
        }
        Arc::clone(&self.current)
    }

    /// Refresh, then search the current generation.
    pub fn search(&mut self, query: &str, k: usize) -> Vec<LexicalHit> {
        let min_score = self.min_score;
        self.refresh().search(query, k, min_score)
    }
}

impl Default for TfIdfIndex {
    fn default() -> Self {
        Self::new(0.01)
    }
}

fn magnitude(vector: &SparseVector) -> f64 {
    ordered_sum(vector.values().map(|w| w * w).collect()).sqrt()
}

/// Sum in ascending order so equal multisets give bit-identical totals
/// regardless of hash iteration order.
fn ordered_sum(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    values.iter().sum()
}

/// Cosine similarity of two sparse vectors with precomputed magnitudes.
///
/// Returns 0.0 when either vector is empty or has zero magnitude.
pub fn sparse_cosine(a: &SparseVector, mag_a: f64, b: &SparseVector, mag_b: f64) -> f64 {
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot = ordered_sum(
        small
            .iter()
            .filter_map(|(term, w)| large.get(term).map(|other| w * other))
            .collect(),
    );
    dot / (mag_a * mag_b)
}
