use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LoreError, Result};
use crate::types::SearchMethod;

/// Top-level configuration for a Lore session.
///
/// Loaded from `~/.lore/config.toml` by default. Each section corresponds to
/// one subsystem of the retrieval and memory core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoreConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub context: ContextConfig,
}

impl LoreConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LoreConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject budgets that would make the cache or the context formatter
    /// unusable.
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_entries == 0 {
            return Err(LoreError::Config(
                "cache.max_entries must be at least 1".to_string(),
            ));
        }
        if self.cache.max_megabytes <= 0.0 {
            return Err(LoreError::Config(
                "cache.max_megabytes must be positive".to_string(),
            ));
        }
        if self.context.chars_per_token == 0 {
            return Err(LoreError::Config(
                "context.chars_per_token must be at least 1".to_string(),
            ));
        }
        if self.retrieval.chunk_max_chars == 0 {
            return Err(LoreError::Config(
                "retrieval.chunk_max_chars must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Hybrid retrieval engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of results returned when the caller does not specify one.
    pub default_top_k: usize,
    /// Method used when the caller does not specify one.
    pub default_method: SearchMethod,
    /// Lexical scores at or below this floor are discarded.
    pub lexical_min_score: f64,
    /// Semantic scores at or below this floor are discarded.
    pub semantic_min_score: f64,
    /// Maximum number of characters of chunk text sent to the embedder.
    pub embed_char_limit: usize,
    /// Records longer than this are split into several chunks.
    pub chunk_max_chars: usize,
    /// Overlap, in words, between consecutive parts of an oversized paragraph.
    pub chunk_overlap_words: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 10,
            default_method: SearchMethod::Hybrid,
            lexical_min_score: 0.01,
            semantic_min_score: 0.3,
            embed_char_limit: 2000,
            chunk_max_chars: 2000,
            chunk_overlap_words: 40,
        }
    }
}

/// Bounded content cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of content units held at once.
    pub max_entries: usize,
    /// Approximate byte budget, in megabytes.
    pub max_megabytes: f64,
}

impl CacheConfig {
    /// Byte budget derived from `max_megabytes`.
    pub fn max_bytes(&self) -> usize {
        (self.max_megabytes * 1024.0 * 1024.0) as usize
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 5,
            max_megabytes: 50.0,
        }
    }
}

/// Content memory manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum key points kept per content unit.
    pub max_key_points: usize,
    /// Maximum plot events kept per content unit.
    pub max_plot_events: usize,
    /// Number of neighbouring units warmed in each direction on enter.
    pub preload_radius: usize,
    /// Maximum key points fed into the retrieval engine on rebuild.
    pub indexed_key_points: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_key_points: 10,
            max_plot_events: 5,
            preload_radius: 1,
            indexed_key_points: 100,
        }
    }
}

/// Context formatter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Approximate token budget of the assembled context block.
    pub max_tokens: usize,
    /// Characters assumed per token when estimating size.
    pub chars_per_token: usize,
    /// Number of ranked results considered for the block.
    pub top_k: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            chars_per_token: 4,
            top_k: 10,
        }
    }
}
