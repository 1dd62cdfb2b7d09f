//! Embedding service trait and the availability wrapper the engine uses.
//!
//! - `EmbeddingService` is implemented by the host (a local model, a remote
//!   API client). Calls are synchronous; callers that live on an async
//!   runtime offload them to a blocking worker.
//! - `Embedder` records, once at construction, whether a service exists.
//! - `MockEmbedding` provides deterministic hash-based vectors for testing.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::warn;

use lore_core::error::{LoreError, Result};

/// Service for generating text embeddings.
///
/// Implementations convert text into fixed-dimensional vectors that capture
/// semantic meaning. Used for both indexing and query embedding.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService + ?Sized> EmbeddingService for Arc<T> {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }
}

/// Semantic capability, decided once when the engine is built.
///
/// With `Unavailable`, semantic search returns nothing and hybrid search
/// degrades to lexical-only.
#[derive(Clone, Default)]
pub enum Embedder {
    Available(Arc<dyn EmbeddingService>),
    #[default]
    Unavailable,
}

impl Embedder {
    pub fn available(service: impl EmbeddingService + 'static) -> Self {
        Embedder::Available(Arc::new(service))
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Embedder::Available(_))
    }

    /// Embed `text`, treating any failure as "no vector".
    ///
    /// Failures and empty vectors are logged and mapped to `None` so that a
    /// single bad chunk or query never aborts indexing or search.
    pub fn try_embed(&self, text: &str) -> Option<Vec<f32>> {
        let service = match self {
            Embedder::Available(service) => service,
            Embedder::Unavailable => return None,
        };

        match service.embed(text) {
            Ok(vector) if vector.is_empty() => {
                warn!("embedding service returned an empty vector");
                None
            }
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(error = %e, chars = text.chars().count(), "embedding failed");
                None
            }
        }
    }
}

impl fmt::Debug for Embedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Embedder::Available(service) => f
                .debug_struct("Available")
                .field("dimensions", &service.dimensions())
                .finish(),
            Embedder::Unavailable => f.write_str("Unavailable"),
        }
    }
}

impl<T: EmbeddingService + 'static> From<Option<T>> for Embedder {
    fn from(service: Option<T>) -> Self {
        match service {
            Some(service) => Embedder::available(service),
            None => Embedder::Unavailable,
        }
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding - deterministic hash-based vectors for testing
// ---------------------------------------------------------------------------

/// Default dimensionality of [`MockEmbedding`].
pub const MOCK_DIMENSIONS: usize = 384;

/// Mock embedding service that returns deterministic unit vectors.
///
/// The output is derived from a hash of the input text, so identical inputs
/// always produce identical outputs while unrelated texts are close to
/// orthogonal.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    dimensions: usize,
}

impl MockEmbedding {
    pub fn new() -> Self {
        Self {
            dimensions: MOCK_DIMENSIONS,
        }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut result = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            result.push(val as f32);
        }

        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }

        result
    }
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingService for MockEmbedding {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(LoreError::Embedding("Cannot embed empty text".to_string()));
        }
        Ok(self.hash_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
