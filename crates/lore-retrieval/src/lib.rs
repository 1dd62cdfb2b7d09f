//! Lore retrieval crate - tokenizer, TF-IDF and embedding indices, the hybrid
//! search engine, record chunking, and prompt context assembly.
//!
//! The lexical side always works. The semantic side needs an
//! [`EmbeddingService`] supplied by the host; without one the engine
//! degrades to lexical-only search.

pub mod chunker;
pub mod context;
pub mod embedding;
pub mod index;
pub mod search;
pub mod tfidf;
pub mod tokenizer;

pub use chunker::Chunker;
pub use context::ContextFormatter;
pub use embedding::{Embedder, EmbeddingService, MockEmbedding};
pub use index::EmbeddingIndex;
pub use search::{HybridSearchEngine, IndexStats, ScoredResult, SearchFilters, SyncReport};
pub use tfidf::TfIdfIndex;
