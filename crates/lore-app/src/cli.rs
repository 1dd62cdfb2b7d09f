//! CLI argument definitions for the `lore` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use lore_core::SearchMethod;

/// Lore - search a writing project's lore and chapter memory.
#[derive(Parser, Debug)]
#[command(name = "lore", version, about)]
pub struct CliArgs {
    /// JSON corpus: `{"records": [...], "units": [...], "entities": [...]}`.
    #[arg(short = 'i', long = "corpus")]
    pub corpus: PathBuf,

    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Use deterministic hash-based embeddings for semantic search.
    #[arg(long = "mock-embeddings")]
    pub mock_embeddings: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ranked search over records and chapter key points.
    Search {
        query: String,
        /// keyword, tfidf, embedding or hybrid.
        #[arg(short = 'm', long)]
        method: Option<SearchMethod>,
        #[arg(short = 'k', long = "top-k")]
        top_k: Option<usize>,
        /// Restrict results to these source kinds (repeatable).
        #[arg(long = "kind")]
        kinds: Vec<String>,
    },
    /// Print the prompt context block for a query.
    Context {
        query: String,
        #[arg(long = "max-tokens")]
        max_tokens: Option<usize>,
    },
    /// Chunks similar to a piece of text.
    Similar {
        text: String,
        #[arg(short = 'k', long = "top-k", default_value_t = 5)]
        top_k: usize,
        /// Chunk id to leave out of the results.
        #[arg(long)]
        exclude: Option<String>,
    },
    /// Print derived chapter summaries as JSON.
    Summarize {
        /// Only this unit; all units when omitted.
        unit: Option<String>,
    },
    /// Print index and cache statistics as JSON.
    Stats,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > LORE_CONFIG env var > ~/.lore/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("LORE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".lore").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".lore").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_with_options() {
        let args = CliArgs::parse_from([
            "lore", "--corpus", "book.json", "search", "harbor", "-m", "semantic", "-k", "3",
            "--kind", "place", "--kind", "character",
        ]);
        match args.command {
            Command::Search {
                query,
                method,
                top_k,
                kinds,
            } => {
                assert_eq!(query, "harbor");
                assert_eq!(method, Some(SearchMethod::Embedding));
                assert_eq!(top_k, Some(3));
                assert_eq!(kinds, vec!["place", "character"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_method() {
        let parsed = CliArgs::try_parse_from([
            "lore", "--corpus", "book.json", "search", "harbor", "--method", "fuzzy",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_config_flag_wins() {
        let args = CliArgs::parse_from(["lore", "-i", "b.json", "-c", "/tmp/lore.toml", "stats"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/lore.toml"));
    }

    #[test]
    fn test_log_level_flag_overrides_config() {
        let args = CliArgs::parse_from(["lore", "-i", "b.json", "stats"]);
        assert_eq!(args.resolve_log_level("warn"), "warn");

        let args = CliArgs::parse_from(["lore", "-i", "b.json", "-l", "debug", "stats"]);
        assert_eq!(args.resolve_log_level("warn"), "debug");
    }
}
