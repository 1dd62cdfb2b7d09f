//! Lore command-line binary - composition root.
//!
//! 1. Parse arguments and load configuration from TOML
//! 2. Install the tracing subscriber
//! 3. Load the JSON corpus and open a writing session over it
//! 4. Derive chapter summaries and sync the index on a blocking worker
//! 5. Run the requested subcommand

mod cli;
mod corpus;

use std::sync::Arc;

use clap::Parser;

use lore_core::config::LoreConfig;
use lore_core::telemetry::init_tracing;
use lore_memory::WritingSession;
use lore_retrieval::{Embedder, MockEmbedding, ScoredResult, SearchFilters};

use cli::{CliArgs, Command};
use corpus::Corpus;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing so its log level applies; problems are
    // reported once the subscriber exists.
    let config_file = args.resolve_config_path();
    let loaded = if config_file.exists() {
        Some(LoreConfig::load(&config_file))
    } else {
        None
    };
    let config_level = match &loaded {
        Some(Ok(config)) => config.general.log_level.clone(),
        _ => LoreConfig::default().general.log_level,
    };
    init_tracing(&args.resolve_log_level(&config_level));

    tracing::info!("Starting Lore v{}", env!("CARGO_PKG_VERSION"));
    let config = match loaded {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            tracing::warn!(path = %config_file.display(), error = %e, "Invalid config, using defaults");
            LoreConfig::default()
        }
        None => {
            tracing::debug!(path = %config_file.display(), "No config file, using defaults");
            LoreConfig::default()
        }
    };

    let corpus = Arc::new(Corpus::load(&args.corpus)?);
    let embedder = if args.mock_embeddings {
        Embedder::available(MockEmbedding::new())
    } else {
        Embedder::Unavailable
    };
    tracing::info!(semantic = embedder.is_available(), "Embedding capability selected");

    let session = WritingSession::new(&config, corpus.clone(), corpus, embedder);

    // Summaries feed key points into the index, so derive them first.
    let session = tokio::task::spawn_blocking(move || -> lore_core::Result<WritingSession> {
        let mut session = session;
        session.memory_mut().all_summaries()?;
        session.rebuild_index()?;
        Ok(session)
    })
    .await??;

    match args.command {
        Command::Search {
            query,
            method,
            top_k,
            kinds,
        } => {
            let filters = SearchFilters::kinds(kinds);
            let results = session.search(&query, method, top_k, &filters)?;
            print_results(&results);
        }
        Command::Context { query, max_tokens } => {
            let budget = max_tokens.unwrap_or(config.context.max_tokens);
            let context = session.format_context(&query, budget)?;
            if context.is_empty() {
                println!("(no relevant context)");
            } else {
                println!("{}", context);
            }
        }
        Command::Similar {
            text,
            top_k,
            exclude,
        } => {
            let results = session.find_similar(&text, top_k, exclude.as_deref())?;
            print_results(&results);
        }
        Command::Summarize { unit } => {
            let summaries = session.memory().export_summaries();
            match unit {
                Some(id) => match summaries.get(&id) {
                    Some(summary) => println!("{}", serde_json::to_string_pretty(summary)?),
                    None => {
                        tracing::error!(unit = %id, "Unknown unit");
                        return Err(format!("unknown unit: {}", id).into());
                    }
                },
                None => println!("{}", serde_json::to_string_pretty(&summaries)?),
            }
        }
        Command::Stats => {
            let stats = serde_json::json!({
                "index": session.engine().stats()?,
                "cache": session.memory().cache_stats(),
                "summaries": session.memory().summary_count(),
            });
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

fn print_results(results: &[ScoredResult]) {
    if results.is_empty() {
        println!("(no results)");
        return;
    }
    for (rank, result) in results.iter().enumerate() {
        println!(
            "{:>2}. {:.3} [{}] {} ({}: {})",
            rank + 1,
            result.score,
            result.match_kind,
            result.chunk.id,
            result.chunk.kind,
            result.chunk.source_name,
        );
        if !result.matched_terms.is_empty() {
            println!("    terms: {}", result.matched_terms.join(", "));
        }
    }
}
