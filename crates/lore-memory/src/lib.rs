//! Lore memory crate - bounded content cache, lazy summary derivation with
//! dirty tracking, and the writing session that ties memory to retrieval.
//!
//! Provides:
//! - An LRU content cache bounded by entry count and byte size
//! - Keyword-driven chapter summaries (replaceable via [`SummaryDeriver`])
//! - Enter/exit/change hooks that re-derive summaries only when content changed
//! - [`WritingSession`], the per-project handle over engine and memory

pub mod cache;
pub mod manager;
pub mod session;
pub mod summarizer;
pub mod types;

pub use cache::{CacheStats, ContentCache};
pub use manager::ContentMemoryManager;
pub use session::WritingSession;
pub use summarizer::{HeuristicSummarizer, SummaryDeriver};
pub use types::{ContentSummary, KeyPoint, KeyPointKind};
