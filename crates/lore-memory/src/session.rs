//! Writing session: owns the retrieval engine, the content memory, and the
//! catalog of indexable records for one open project.

use std::sync::Arc;

use tracing::info;

use lore_core::error::Result;
use lore_core::{ContentCatalog, ContentSource, LoreConfig, SearchMethod};
use lore_retrieval::{
    Chunker, ContextFormatter, Embedder, HybridSearchEngine, ScoredResult, SearchFilters,
    SyncReport,
};

use crate::manager::ContentMemoryManager;

pub struct WritingSession {
    engine: HybridSearchEngine,
    memory: ContentMemoryManager,
    catalog: Arc<dyn ContentCatalog>,
    chunker: Chunker,
    formatter: ContextFormatter,
    indexed_key_points: usize,
    default_top_k: usize,
    default_method: SearchMethod,
}

impl WritingSession {
    pub fn new(
        config: &LoreConfig,
        catalog: Arc<dyn ContentCatalog>,
        source: Arc<dyn ContentSource>,
        embedder: Embedder,
    ) -> Self {
        Self {
            engine: HybridSearchEngine::with_config(&config.retrieval, embedder),
            memory: ContentMemoryManager::with_config(source, &config.cache, &config.memory),
            catalog,
            chunker: Chunker::from_config(&config.retrieval),
            formatter: ContextFormatter::from_config(&config.context),
            indexed_key_points: config.memory.indexed_key_points,
            default_top_k: config.retrieval.default_top_k,
            default_method: config.retrieval.default_method,
        }
    }

    /// Bring the engine in line with the catalog and the memory's key points.
    ///
    /// Unchanged chunks are skipped and chunks that disappeared are dropped.
    pub fn rebuild_index(&self) -> Result<SyncReport> {
        let records = self.catalog.enumerate_content();
        let mut chunks = self.chunker.chunk_records(&records);
        chunks.extend(self.memory.key_point_chunks(self.indexed_key_points)?);

        let report = self.engine.sync(chunks)?;
        info!(
            records = records.len(),
            indexed = report.indexed,
            unchanged = report.unchanged,
            removed = report.removed,
            "index rebuilt"
        );
        Ok(report)
    }

    pub fn search(
        &self,
        query: &str,
        method: Option<SearchMethod>,
        top_k: Option<usize>,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredResult>> {
        self.engine.search(
            query,
            method.unwrap_or(self.default_method),
            top_k.unwrap_or(self.default_top_k),
            filters,
        )
    }

    pub fn find_similar(
        &self,
        text: &str,
        top_k: usize,
        exclude_id: Option<&str>,
    ) -> Result<Vec<ScoredResult>> {
        self.engine.find_similar(text, top_k, exclude_id)
    }

    /// Context block for `query` within roughly `max_tokens` tokens.
    pub fn format_context(&self, query: &str, max_tokens: usize) -> Result<String> {
        let formatter = ContextFormatter {
            max_tokens,
            ..self.formatter.clone()
        };
        formatter.format(&self.engine, query)
    }

    pub fn engine(&self) -> &HybridSearchEngine {
        &self.engine
    }

    pub fn memory(&self) -> &ContentMemoryManager {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut ContentMemoryManager {
        &mut self.memory
    }

    /// Switch to another project: new catalog and source, empty index and
    /// memory.
    pub fn switch_project(
        &mut self,
        catalog: Arc<dyn ContentCatalog>,
        source: Arc<dyn ContentSource>,
    ) -> Result<()> {
        self.engine.clear()?;
        self.memory.set_source(source);
        self.catalog = catalog;
        info!("project switched");
        Ok(())
    }
}

impl std::fmt::Debug for WritingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritingSession")
            .field("engine", &self.engine)
            .field("memory", &self.memory)
            .finish()
    }
}
