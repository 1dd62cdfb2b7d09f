//! Content memory manager.
//!
//! Keeps recently used units warm in the [`ContentCache`], derives summaries
//! lazily, and tracks which units changed since their summary was derived.
//! Content is always read cache-first, so an edit reported through
//! [`ContentMemoryManager::on_content_changed`] is what the next derivation
//! sees. Once an edited unit has been evicted, the [`ContentSource`] is
//! expected to return the persisted edit.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use lore_core::config::{CacheConfig, MemoryConfig};
use lore_core::error::Result;
use lore_core::{content_hash, Chunk, ContentSource, MetaKey, SourceKind};

use crate::cache::{CacheStats, ContentCache};
use crate::summarizer::{HeuristicSummarizer, SummaryDeriver};
use crate::types::{ContentSummary, KeyPoint, KeyPointKind};

pub struct ContentMemoryManager {
    source: Arc<dyn ContentSource>,
    deriver: Box<dyn SummaryDeriver>,
    cache: ContentCache,
    summaries: BTreeMap<String, ContentSummary>,
    dirty: HashSet<String>,
    active: Option<String>,
    preload_radius: usize,
}

impl ContentMemoryManager {
    /// Create a manager with default cache bounds and the heuristic
    /// summarizer.
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self::with_config(source, &CacheConfig::default(), &MemoryConfig::default())
    }

    pub fn with_config(
        source: Arc<dyn ContentSource>,
        cache: &CacheConfig,
        memory: &MemoryConfig,
    ) -> Self {
        Self {
            source,
            deriver: Box::new(HeuristicSummarizer::from_config(memory)),
            cache: ContentCache::from_config(cache),
            summaries: BTreeMap::new(),
            dirty: HashSet::new(),
            active: None,
            preload_radius: memory.preload_radius,
        }
    }

    /// Replace the summary heuristic.
    pub fn with_deriver(mut self, deriver: impl SummaryDeriver + 'static) -> Self {
        self.deriver = Box::new(deriver);
        self
    }

    // =========================================================================
    // Content access
    // =========================================================================

    /// Current text of `id`: cached copy first, then the source (which then
    /// warms the cache). `Ok(None)` if the source does not know the id.
    pub fn content(&self, id: &str) -> Result<Option<Arc<str>>> {
        if let Some(cached) = self.cache.get(id) {
            return Ok(Some(cached));
        }
        match self.source.load_content(id)? {
            Some(text) => {
                let text: Arc<str> = Arc::from(text);
                self.cache.put(id, Arc::clone(&text));
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    /// Like [`Self::content`] but leaves cache recency, counters and
    /// contents untouched.
    fn live_content(&self, id: &str) -> Result<Option<Arc<str>>> {
        if let Some(cached) = self.cache.peek(id) {
            return Ok(Some(cached));
        }
        Ok(self.source.load_content(id)?.map(Arc::from))
    }

    // =========================================================================
    // Editor lifecycle
    // =========================================================================

    /// The user opened `id`: make it active, warm it, derive its summary if
    /// missing or stale, then warm its neighbours.
    ///
    /// Neighbour warming never evicts `id` and never fails the call; a
    /// neighbour that cannot be loaded is logged and skipped.
    pub fn on_enter(&mut self, id: &str) -> Result<()> {
        self.active = Some(id.to_string());
        if self.content(id)?.is_none() {
            return Ok(());
        }
        self.refresh_summary(id)?;
        if self.preload_radius > 0 {
            self.warm_neighbours(id);
        }
        Ok(())
    }

    /// The user left `id`. Marks it dirty if its live content no longer
    /// matches the summary; does not re-derive.
    pub fn on_exit(&mut self, id: &str) -> Result<()> {
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }

        let Some(summary) = self.summaries.get(id) else {
            return Ok(());
        };
        if let Some(content) = self.live_content(id)? {
            if content_hash(&content) != summary.content_hash {
                debug!(unit_id = %id, "content drifted from summary");
                self.dirty.insert(id.to_string());
            }
        }
        Ok(())
    }

    /// Write `text` through to the cache and mark `id` dirty.
    pub fn on_content_changed(&mut self, id: &str, text: impl Into<String>) {
        let text: String = text.into();
        self.cache.put(id, text);
        self.dirty.insert(id.to_string());
    }

    /// Summary of `id`, re-derived first if missing or dirty. `None` if the
    /// unit is unknown.
    pub fn get_summary(&mut self, id: &str) -> Result<Option<&ContentSummary>> {
        self.refresh_summary(id)?;
        Ok(self.summaries.get(id))
    }

    fn refresh_summary(&mut self, id: &str) -> Result<()> {
        if self.summaries.contains_key(id) && !self.dirty.contains(id) {
            return Ok(());
        }

        if let Some(content) = self.content(id)? {
            let names = self.source.entity_names();
            let summary = self.deriver.derive(id, &content, &names);
            info!(
                unit_id = %id,
                key_points = summary.key_points.len(),
                entities = summary.entities.len(),
                "summary derived"
            );
            self.summaries.insert(id.to_string(), summary);
        }
        self.dirty.remove(id);
        Ok(())
    }

    /// Summaries for every unit in the source's order, deriving as needed.
    pub fn all_summaries(&mut self) -> Result<Vec<ContentSummary>> {
        let mut out = Vec::new();
        for id in self.source.unit_order() {
            if let Some(summary) = self.get_summary(&id)? {
                out.push(summary.clone());
            }
        }
        Ok(out)
    }

    // =========================================================================
    // Preloading
    // =========================================================================

    /// Warm the cache for up to `n` units on each side of `id`, nearest
    /// first. Returns how many units were loaded from the source.
    pub fn preload_adjacent(&self, id: &str, n: usize) -> Result<usize> {
        let neighbours = self.neighbours(id, n);
        self.preload(neighbours.iter().map(String::as_str))
    }

    /// Up to `n` units on each side of `id` in source order, alternating
    /// before and after, nearest first.
    fn neighbours(&self, id: &str, n: usize) -> Vec<String> {
        let mut order = self.source.unit_order();
        let Some(index) = order.iter().position(|u| u == id) else {
            return Vec::new();
        };

        let mut picked = Vec::new();
        for offset in 1..=n {
            if let Some(before) = index.checked_sub(offset) {
                picked.push(std::mem::take(&mut order[before]));
            }
            if let Some(after) = order.get_mut(index + offset) {
                picked.push(std::mem::take(after));
            }
        }
        picked
    }

    /// Best-effort preload around the active unit `id`.
    ///
    /// At most `max_count - 1` neighbours are loaded, `id` is promoted before
    /// each insert, and a neighbour that would not fit next to `id` in the
    /// byte budget is skipped, so `id` is never the eviction victim.
    fn warm_neighbours(&self, id: &str) {
        let stats = self.cache.stats();
        let budget = stats.max_count.saturating_sub(1);
        let mut loaded = 0;

        for neighbour in self.neighbours(id, self.preload_radius) {
            if loaded >= budget {
                break;
            }
            if self.cache.contains(&neighbour) {
                continue;
            }
            match self.source.load_content(&neighbour) {
                Ok(Some(text)) => {
                    let active_bytes = self.cache.peek(id).map_or(0, |c| c.len());
                    if active_bytes + text.len() > stats.max_bytes {
                        debug!(unit_id = %neighbour, "neighbour too large to keep beside active unit");
                        continue;
                    }
                    self.cache.promote(id);
                    self.cache.put(neighbour, text);
                    loaded += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(unit_id = %neighbour, error = %e, "neighbour preload failed");
                }
            }
        }
        if loaded > 0 {
            debug!(unit_id = %id, loaded, "neighbours warmed");
        }
    }

    /// Warm the cache for each id not already cached.
    pub fn preload<'a, I>(&self, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut loaded = 0;
        for id in ids {
            if self.cache.contains(id) {
                continue;
            }
            if let Some(text) = self.source.load_content(id)? {
                self.cache.put(id, text);
                loaded += 1;
            }
        }
        if loaded > 0 {
            debug!(loaded, "units preloaded");
        }
        Ok(loaded)
    }

    // =========================================================================
    // Key points
    // =========================================================================

    /// Key points whose content contains `query` (case-insensitive),
    /// optionally restricted to `kinds`, most important first.
    pub fn search_key_points(&self, query: &str, kinds: Option<&[KeyPointKind]>) -> Vec<KeyPoint> {
        let query = query.to_lowercase();
        let mut found: Vec<KeyPoint> = self
            .summaries
            .values()
            .flat_map(|s| s.key_points.iter())
            .filter(|kp| kinds.map_or(true, |kinds| kinds.is_empty() || kinds.contains(&kp.kind)))
            .filter(|kp| kp.content.to_lowercase().contains(&query))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.importance.cmp(&a.importance));
        found
    }

    /// All key points ordered by importance then id, at most `max`.
    pub fn key_points_for_context(&self, max: usize) -> Vec<KeyPoint> {
        let mut points: Vec<KeyPoint> = self
            .summaries
            .values()
            .flat_map(|s| s.key_points.iter().cloned())
            .collect();
        points.sort_by(|a, b| b.importance.cmp(&a.importance).then_with(|| a.id.cmp(&b.id)));
        points.truncate(max);
        points
    }

    /// Key points as `chapter_key_point` chunks for the retrieval engine.
    pub fn key_point_chunks(&self, max: usize) -> Result<Vec<Chunk>> {
        self.key_points_for_context(max)
            .into_iter()
            .map(|kp| {
                Chunk::new(
                    format!("{}_{}", SourceKind::ChapterKeyPoint, kp.id),
                    format!("Chapter Key Point ({}): {}", kp.kind, kp.content),
                    SourceKind::ChapterKeyPoint,
                    format!("Chapter Key Point - {}", kp.kind.title()),
                )
                .with_source_id(kp.id.as_str())
                .with_meta(MetaKey::PointType, kp.kind.as_str())?
                .with_meta(MetaKey::Importance, kp.importance.to_string())?
                .with_meta(MetaKey::ChapterId, kp.unit_id.as_str())
            })
            .collect()
    }

    /// Unit id -> entity names mentioned in it.
    pub fn entities_by_unit(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.summaries
            .iter()
            .map(|(id, s)| (id.clone(), s.entities.clone()))
            .collect()
    }

    // =========================================================================
    // Persistence and reset
    // =========================================================================

    pub fn export_summaries(&self) -> BTreeMap<String, ContentSummary> {
        self.summaries.clone()
    }

    /// Replace all summaries. Units whose content no longer matches an
    /// imported hash are picked up by the next [`Self::on_exit`] or by a
    /// later [`Self::on_content_changed`].
    pub fn import_summaries(&mut self, summaries: BTreeMap<String, ContentSummary>) {
        info!(count = summaries.len(), "summaries imported");
        self.summaries = summaries;
    }

    /// Forget everything: cache, summaries, dirty set and active unit.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.summaries.clear();
        self.dirty.clear();
        self.active = None;
        info!("memory reset");
    }

    /// Swap the backing source, e.g. when another project is opened.
    pub fn set_source(&mut self, source: Arc<dyn ContentSource>) {
        self.source = source;
        self.reset();
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_dirty(&self, id: &str) -> bool {
        self.dirty.contains(id)
    }

    pub fn summary_count(&self) -> usize {
        self.summaries.len()
    }
}

impl std::fmt::Debug for ContentMemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentMemoryManager")
            .field("active", &self.active)
            .field("summaries", &self.summaries.len())
            .field("dirty", &self.dirty.len())
            .field("cache", &self.cache)
            .finish()
    }
}
