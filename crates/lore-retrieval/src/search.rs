//! Hybrid retrieval engine combining the TF-IDF and embedding indices.
//!
//! `HybridSearchEngine` owns both sub-indices behind one `RwLock` so they
//! always share chunk identity. Embedding calls run outside the lock; only
//! the insert itself and the IDF rebuild take the write side.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use lore_core::config::RetrievalConfig;
use lore_core::error::{LoreError, Result};
use lore_core::{content_hash, Chunk, ChunkId, MatchKind, SearchMethod, SourceKind};

use crate::embedding::Embedder;
use crate::index::{embed_chunk, EmbeddingIndex};
use crate::tfidf::{Generation, TfIdfIndex};

/// Filters applied to search results after merging.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Keep only chunks of these kinds. Empty means no restriction.
    #[serde(default)]
    pub source_kinds: Vec<SourceKind>,
}

impl SearchFilters {
    pub fn kinds<I, K>(kinds: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<SourceKind>,
    {
        Self {
            source_kinds: kinds.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source_kinds.is_empty()
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        self.source_kinds.is_empty() || self.source_kinds.contains(&chunk.kind)
    }
}

/// A single ranked search result.
#[derive(Debug, Clone)]
pub struct ScoredResult {
    pub chunk: Arc<Chunk>,
    /// Relevance score (0.0 to 1.0).
    pub score: f64,
    pub match_kind: MatchKind,
    /// Query terms found in the chunk; empty for purely semantic matches.
    pub matched_terms: Vec<String>,
}

/// Outcome of [`HybridSearchEngine::sync`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Chunks that were new or whose text changed.
    pub indexed: usize,
    /// Chunks skipped because their text hash was unchanged.
    pub unchanged: usize,
    /// Previously indexed chunks absent from the new set.
    pub removed: usize,
}

/// Engine statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_documents: usize,
    pub documents_by_kind: BTreeMap<String, usize>,
    pub vocabulary_size: usize,
    pub embedded_documents: usize,
    pub dimensions: Option<usize>,
    pub generation: u64,
    pub embeddings_available: bool,
}

struct EngineState {
    lexical: TfIdfIndex,
    semantic: EmbeddingIndex,
    /// Text hash per indexed chunk, for skip-if-unchanged.
    hashes: HashMap<ChunkId, String>,
}

/// Hybrid search engine over one project's chunks.
pub struct HybridSearchEngine {
    state: RwLock<EngineState>,
    embedder: Embedder,
    embed_char_limit: usize,
}

impl HybridSearchEngine {
    /// Create an engine with default score floors and limits.
    pub fn new(embedder: Embedder) -> Self {
        Self::with_config(&RetrievalConfig::default(), embedder)
    }

    pub fn with_config(config: &RetrievalConfig, embedder: Embedder) -> Self {
        Self {
            state: RwLock::new(EngineState {
                lexical: TfIdfIndex::new(config.lexical_min_score),
                semantic: EmbeddingIndex::new(config.semantic_min_score),
                hashes: HashMap::new(),
            }),
            embedder,
            embed_char_limit: config.embed_char_limit,
        }
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, EngineState>> {
        self.state
            .read()
            .map_err(|e| LoreError::Index(format!("Lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, EngineState>> {
        self.state
            .write()
            .map_err(|e| LoreError::Index(format!("Lock poisoned: {}", e)))
    }

    /// Index a chunk in both sub-indices.
    ///
    /// Returns `false` when the chunk's text is byte-identical to what was
    /// last indexed under its id; nothing is touched in that case.
    pub fn index(&self, chunk: Chunk) -> Result<bool> {
        let hash = content_hash(&chunk.text);
        if self.read()?.hashes.get(&chunk.id) == Some(&hash) {
            debug!(chunk_id = %chunk.id, "unchanged, skipping");
            return Ok(false);
        }

        let chunk = Arc::new(chunk);
        let vector = embed_chunk(&chunk, &self.embedder, self.embed_char_limit);

        let mut state = self.write()?;
        state.lexical.add(Arc::clone(&chunk));
        state.semantic.insert(Arc::clone(&chunk), vector);
        state.hashes.insert(chunk.id.clone(), hash);
        debug!(chunk_id = %chunk.id, kind = %chunk.kind, "indexed");
        Ok(true)
    }

    /// Index every chunk, returning how many were (re)indexed.
    pub fn index_many<I>(&self, chunks: I) -> Result<usize>
    where
        I: IntoIterator<Item = Chunk>,
    {
        let mut indexed = 0;
        for chunk in chunks {
            if self.index(chunk)? {
                indexed += 1;
            }
        }
        Ok(indexed)
    }

    /// Make the index hold exactly `chunks`.
    ///
    /// Changed or new chunks are indexed, unchanged ones skipped, and every
    /// indexed id not in the set is removed.
    pub fn sync<I>(&self, chunks: I) -> Result<SyncReport>
    where
        I: IntoIterator<Item = Chunk>,
    {
        let mut report = SyncReport::default();
        let mut keep: HashSet<ChunkId> = HashSet::new();

        for chunk in chunks {
            keep.insert(chunk.id.clone());
            if self.index(chunk)? {
                report.indexed += 1;
            } else {
                report.unchanged += 1;
            }
        }

        let stale: Vec<ChunkId> = self
            .read()?
            .hashes
            .keys()
            .filter(|id| !keep.contains(*id))
            .cloned()
            .collect();
        for id in stale {
            if self.remove(&id)? {
                report.removed += 1;
            }
        }

        info!(
            indexed = report.indexed,
            unchanged = report.unchanged,
            removed = report.removed,
            "index synced"
        );
        Ok(report)
    }

    /// Remove a chunk from both sub-indices.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut state = self.write()?;
        let lexical = state.lexical.remove(id);
        let semantic = state.semantic.remove(id);
        state.hashes.remove(id);
        Ok(lexical || semantic)
    }

    pub fn clear(&self) -> Result<()> {
        let mut state = self.write()?;
        state.lexical.clear();
        state.semantic.clear();
        state.hashes.clear();
        info!("index cleared");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Arc<Chunk>>> {
        Ok(self.read()?.lexical.get(id).cloned())
    }

    /// Current TF-IDF generation, rebuilding first if the index is dirty.
    fn lexical_generation(&self) -> Result<(Arc<Generation>, f64)> {
        {
            let state = self.read()?;
            if !state.lexical.is_dirty() {
                return Ok((state.lexical.snapshot(), state.lexical.min_score()));
            }
        }
        let mut state = self.write()?;
        let generation = state.lexical.refresh();
        Ok((generation, state.lexical.min_score()))
    }

    /// Ranked search over the index.
    ///
    /// Each consulted sub-index contributes up to `2 * k` candidates. A chunk
    /// found by both gets the mean of its two scores and is tagged
    /// [`MatchKind::Hybrid`]. Filters apply after merging.
    pub fn search(
        &self,
        query: &str,
        method: SearchMethod,
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredResult>> {
        if k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let fetch = k.saturating_mul(2);

        // (first-insertion sequence, result)
        let mut merged: Vec<(u64, ScoredResult)> = Vec::new();
        let mut positions: HashMap<ChunkId, usize> = HashMap::new();

        if method.uses_lexical() {
            let (generation, min_score) = self.lexical_generation()?;
            for hit in generation.search(query, fetch, min_score) {
                positions.insert(hit.chunk.id.clone(), merged.len());
                merged.push((
                    hit.seq,
                    ScoredResult {
                        chunk: hit.chunk,
                        score: hit.score,
                        match_kind: MatchKind::Lexical,
                        matched_terms: hit.matched_terms,
                    },
                ));
            }
        }

        if method.uses_semantic() {
            if let Some(query_vector) = self.embedder.try_embed(query) {
                let hits = self.read()?.semantic.search(&query_vector, fetch);
                for hit in hits {
                    match positions.get(&hit.chunk.id) {
                        Some(&i) => {
                            let existing = &mut merged[i].1;
                            existing.score = (existing.score + hit.score) / 2.0;
                            existing.match_kind = MatchKind::Hybrid;
                        }
                        None => {
                            positions.insert(hit.chunk.id.clone(), merged.len());
                            merged.push((
                                hit.seq,
                                ScoredResult {
                                    chunk: hit.chunk,
                                    score: hit.score,
                                    match_kind: MatchKind::Semantic,
                                    matched_terms: Vec::new(),
                                },
                            ));
                        }
                    }
                }
            }
        }

        if !filters.is_empty() {
            merged.retain(|(_, result)| filters.matches(&result.chunk));
        }

        merged.sort_by(|a, b| b.1.score.total_cmp(&a.1.score).then(a.0.cmp(&b.0)));
        merged.truncate(k);

        debug!(
            query = %query,
            method = ?method,
            results = merged.len(),
            "search complete"
        );
        Ok(merged.into_iter().map(|(_, result)| result).collect())
    }

    /// Chunks similar to `text`, excluding `exclude_id` (usually the chunk
    /// the text came from).
    pub fn find_similar(
        &self,
        text: &str,
        k: usize,
        exclude_id: Option<&str>,
    ) -> Result<Vec<ScoredResult>> {
        let extra = usize::from(exclude_id.is_some());
        let mut results = self.search(
            text,
            SearchMethod::Hybrid,
            k.saturating_add(extra),
            &SearchFilters::default(),
        )?;
        if let Some(exclude) = exclude_id {
            results.retain(|r| r.chunk.id != exclude);
        }
        results.truncate(k);
        Ok(results)
    }

    /// Number of indexed chunks. Cheap; 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.lexical.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source kinds present in the index, sorted by name.
    pub fn source_kinds(&self) -> Result<Vec<SourceKind>> {
        let state = self.read()?;
        let kinds: BTreeSet<String> = state
            .lexical
            .chunks()
            .map(|chunk| chunk.kind.as_str().to_string())
            .collect();
        Ok(kinds.into_iter().map(SourceKind::from).collect())
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let (generation, _) = self.lexical_generation()?;
        let state = self.read()?;

        let mut documents_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for chunk in state.lexical.chunks() {
            *documents_by_kind
                .entry(chunk.kind.as_str().to_string())
                .or_insert(0) += 1;
        }

        Ok(IndexStats {
            total_documents: state.lexical.len(),
            documents_by_kind,
            vocabulary_size: generation.vocabulary_size(),
            embedded_documents: state.semantic.embedded_count(),
            dimensions: state.semantic.dimensions(),
            generation: generation.number(),
            embeddings_available: self.embedder.is_available(),
        })
    }
}

impl std::fmt::Debug for HybridSearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSearchEngine")
            .field("documents", &self.len())
            .field("embedder", &self.embedder)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use lore_core::error::Result;

    use super::*;
    use crate::embedding::{EmbeddingService, MockEmbedding};

    /// Bag-of-words over a fixed vocabulary, so semantic scores are
    /// predictable in tests.
    struct VocabEmbedding;

    const VOCAB: [&str; 4] = ["dragon", "castle", "fire", "dwarves"];

    impl EmbeddingService for VocabEmbedding {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lowered = text.to_lowercase();
            Ok(VOCAB
                .iter()
                .map(|word| if lowered.contains(word) { 1.0 } else { 0.0 })
                .collect())
        }

        fn dimensions(&self) -> usize {
            VOCAB.len()
        }
    }

    fn corpus() -> Vec<Chunk> {
        vec![
            Chunk::new("c1", "The dragon flew over the castle", "place", "Harrowgate"),
            Chunk::new("c2", "The castle was built by dwarves", "place", "Stonehold"),
            Chunk::new("c3", "Dragons breathe fire", "creature", "Dragon"),
        ]
    }

    fn lexical_engine() -> HybridSearchEngine {
        let engine = HybridSearchEngine::new(Embedder::Unavailable);
        engine.index_many(corpus()).unwrap();
        engine
    }

    fn vocab_engine() -> HybridSearchEngine {
        let engine = HybridSearchEngine::new(Embedder::available(VocabEmbedding));
        engine.index_many(corpus()).unwrap();
        engine
    }

    fn ids(results: &[ScoredResult]) -> Vec<&str> {
        results.iter().map(|r| r.chunk.id.as_str()).collect()
    }

    #[test]
    fn test_empty_index_returns_nothing_for_every_method() {
        let engine = HybridSearchEngine::new(Embedder::available(MockEmbedding::new()));
        for method in [
            SearchMethod::Keyword,
            SearchMethod::Tfidf,
            SearchMethod::Embedding,
            SearchMethod::Hybrid,
        ] {
            let results = engine
                .search("dragon", method, 10, &SearchFilters::default())
                .unwrap();
            assert!(results.is_empty(), "{:?} should be empty", method);
        }
    }

    #[test]
    fn test_lexical_ranking() {
        let engine = lexical_engine();
        let results = engine
            .search("dragon castle", SearchMethod::Tfidf, 10, &SearchFilters::default())
            .unwrap();

        assert_eq!(ids(&results), vec!["c1", "c2", "c3"]);
        assert!(results[0].score > results[1].score);
        assert!(results.iter().all(|r| r.match_kind == MatchKind::Lexical));
        assert_eq!(results[0].matched_terms, vec!["dragon", "castle"]);
    }

    #[test]
    fn test_source_kind_filter() {
        let engine = lexical_engine();
        let results = engine
            .search(
                "dragon castle",
                SearchMethod::Tfidf,
                10,
                &SearchFilters::kinds(["creature"]),
            )
            .unwrap();
        assert_eq!(ids(&results), vec!["c3"]);
    }

    #[test]
    fn test_hybrid_merge_uses_mean_score() {
        let engine = vocab_engine();
        let filters = SearchFilters::default();

        let lexical = engine
            .search("dragon castle", SearchMethod::Tfidf, 10, &filters)
            .unwrap();
        let semantic = engine
            .search("dragon castle", SearchMethod::Embedding, 10, &filters)
            .unwrap();
        let hybrid = engine
            .search("dragon castle", SearchMethod::Hybrid, 10, &filters)
            .unwrap();

        assert_eq!(hybrid.len(), 3);
        for result in &hybrid {
            let id = result.chunk.id.as_str();
            let l = lexical.iter().find(|r| r.chunk.id == id).unwrap().score;
            let s = semantic.iter().find(|r| r.chunk.id == id).unwrap().score;
            assert_eq!(result.match_kind, MatchKind::Hybrid);
            assert!((result.score - (l + s) / 2.0).abs() < 1e-9);
        }
        assert_eq!(hybrid[0].chunk.id, "c1");
        // Each chunk appears once.
        let unique: HashSet<&str> = ids(&hybrid).into_iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_semantic_only_hits_keep_semantic_tag() {
        let engine = vocab_engine();
        // No indexed term matches; only the embedding sees "dwarves" inside
        // the query.
        let results = engine
            .search("dwarvesmith", SearchMethod::Hybrid, 10, &SearchFilters::default())
            .unwrap();
        assert_eq!(ids(&results), vec!["c2"]);
        assert_eq!(results[0].match_kind, MatchKind::Semantic);
        assert!(results[0].matched_terms.is_empty());
    }

    #[test]
    fn test_embedding_unavailable_degrades_to_lexical() {
        let engine = lexical_engine();
        let filters = SearchFilters::default();

        assert!(engine
            .search("dragon", SearchMethod::Embedding, 10, &filters)
            .unwrap()
            .is_empty());

        let hybrid = engine
            .search("dragon castle", SearchMethod::Hybrid, 10, &filters)
            .unwrap();
        let lexical = engine
            .search("dragon castle", SearchMethod::Keyword, 10, &filters)
            .unwrap();
        assert_eq!(ids(&hybrid), ids(&lexical));
        assert!(hybrid.iter().all(|r| r.match_kind == MatchKind::Lexical));
    }

    #[test]
    fn test_reindex_identical_text_is_noop() {
        let engine = lexical_engine();
        let filters = SearchFilters::default();
        let before = engine
            .search("dragon castle", SearchMethod::Tfidf, 10, &filters)
            .unwrap();
        let generation = engine.stats().unwrap().generation;

        assert!(!engine.index(corpus().remove(0)).unwrap());

        let after = engine
            .search("dragon castle", SearchMethod::Tfidf, 10, &filters)
            .unwrap();
        assert_eq!(engine.stats().unwrap().generation, generation);
        assert_eq!(ids(&before), ids(&after));
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(b.score, a.score);
        }
    }

    #[test]
    fn test_changed_text_is_reindexed() {
        let engine = lexical_engine();
        let changed = Chunk::new("c2", "The keep was carved from a glacier", "place", "Stonehold");
        assert!(engine.index(changed).unwrap());
        assert_eq!(engine.len(), 3);

        let results = engine
            .search("glacier", SearchMethod::Tfidf, 10, &SearchFilters::default())
            .unwrap();
        assert_eq!(ids(&results), vec!["c2"]);
    }

    #[test]
    fn test_ties_keep_first_insertion_order() {
        let engine = HybridSearchEngine::new(Embedder::Unavailable);
        engine
            .index_many(vec![
                Chunk::new("z", "silver harbor lights", "place", "Z"),
                Chunk::new("a", "silver harbor lights", "place", "A"),
                Chunk::new("m", "silver harbor lights", "place", "M"),
            ])
            .unwrap();
        // Re-indexing with new text keeps the original position.
        engine
            .index(Chunk::new("z", "silver harbor lamps", "place", "Z"))
            .unwrap();
        engine
            .index(Chunk::new("z", "silver harbor lights", "place", "Z"))
            .unwrap();

        let results = engine
            .search("silver harbor", SearchMethod::Tfidf, 10, &SearchFilters::default())
            .unwrap();
        assert_eq!(ids(&results), vec!["z", "a", "m"]);
    }

    #[test]
    fn test_sync_removes_vanished_ids() {
        let engine = lexical_engine();
        let mut next = corpus();
        next.remove(1);
        next.push(Chunk::new("c4", "Wyverns nest in the peaks", "creature", "Wyvern"));

        let report = engine.sync(next).unwrap();
        assert_eq!(
            report,
            SyncReport {
                indexed: 1,
                unchanged: 2,
                removed: 1
            }
        );
        assert_eq!(engine.len(), 3);
        assert!(engine.get("c2").unwrap().is_none());
        assert!(engine.get("c4").unwrap().is_some());
    }

    #[test]
    fn test_find_similar_excludes_source() {
        let engine = lexical_engine();
        let results = engine
            .find_similar("The dragon flew over the castle", 5, Some("c1"))
            .unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.chunk.id != "c1"));

        let with_self = engine
            .find_similar("The dragon flew over the castle", 1, None)
            .unwrap();
        assert_eq!(ids(&with_self), vec!["c1"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let engine = lexical_engine();
        assert!(engine.remove("c1").unwrap());
        assert!(!engine.remove("c1").unwrap());
        assert_eq!(engine.len(), 2);

        engine.clear().unwrap();
        assert!(engine.is_empty());
        assert!(engine
            .search("castle", SearchMethod::Hybrid, 10, &SearchFilters::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_stats_and_source_kinds() {
        let engine = vocab_engine();
        let stats = engine.stats().unwrap();
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.documents_by_kind["place"], 2);
        assert_eq!(stats.documents_by_kind["creature"], 1);
        assert_eq!(stats.embedded_documents, 3);
        assert_eq!(stats.dimensions, Some(4));
        assert!(stats.vocabulary_size > 0);
        assert!(stats.embeddings_available);

        let kinds = engine.source_kinds().unwrap();
        assert_eq!(
            kinds,
            vec![SourceKind::from("creature"), SourceKind::Place]
        );
    }

    #[test]
    fn test_zero_k_and_blank_query() {
        let engine = lexical_engine();
        let filters = SearchFilters::default();
        assert!(engine
            .search("dragon", SearchMethod::Hybrid, 0, &filters)
            .unwrap()
            .is_empty());
        assert!(engine
            .search("   ", SearchMethod::Hybrid, 10, &filters)
            .unwrap()
            .is_empty());
    }
}
