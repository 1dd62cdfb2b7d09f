//! Prompt context assembly.
//!
//! Renders ranked search results into a single block for a language-model
//! prompt, stopping at the first result that would overrun the token budget.

use tracing::debug;

use lore_core::config::ContextConfig;
use lore_core::error::Result;
use lore_core::SearchMethod;

use crate::search::{HybridSearchEngine, ScoredResult, SearchFilters};

pub const CONTEXT_HEADER: &str = "RELEVANT CONTEXT FROM PROJECT:\n\n";
pub const BLOCK_SEPARATOR: &str = "\n---\n";

/// Render one result as `[KIND: name]\n<text>\n`.
pub fn render_block(result: &ScoredResult) -> String {
    let chunk = &result.chunk;
    format!(
        "[{}: {}]\n{}\n",
        chunk.kind.as_str().to_uppercase(),
        chunk.source_name,
        chunk.text
    )
}

/// Builds context blocks under an approximate token budget.
#[derive(Debug, Clone)]
pub struct ContextFormatter {
    /// Approximate token budget of the block, header excluded.
    pub max_tokens: usize,
    /// Characters assumed per token.
    pub chars_per_token: usize,
    /// Number of ranked results considered.
    pub top_k: usize,
    pub method: SearchMethod,
}

impl ContextFormatter {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            ..Self::default()
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            chars_per_token: config.chars_per_token.max(1),
            top_k: config.top_k,
            method: SearchMethod::Hybrid,
        }
    }

    fn estimate_tokens(&self, block: &str) -> f64 {
        block.chars().count() as f64 / self.chars_per_token.max(1) as f64
    }

    /// Search `engine` for `query` and assemble the results.
    pub fn format(&self, engine: &HybridSearchEngine, query: &str) -> Result<String> {
        let results = engine.search(query, self.method, self.top_k, &SearchFilters::default())?;
        Ok(self.assemble(&results))
    }

    /// Greedily append rendered results in rank order while they fit.
    ///
    /// A result that does not fit ends assembly; it is never truncated and
    /// later, smaller results are not considered. No results yields "".
    pub fn assemble(&self, results: &[ScoredResult]) -> String {
        let mut blocks: Vec<String> = Vec::new();
        let mut used = 0.0;

        for result in results {
            let block = render_block(result);
            let cost = self.estimate_tokens(&block);
            if used + cost > self.max_tokens as f64 {
                break;
            }
            used += cost;
            blocks.push(block);
        }

        debug!(
            considered = results.len(),
            included = blocks.len(),
            tokens = used,
            "context assembled"
        );

        if blocks.is_empty() {
            return String::new();
        }
        format!("{}{}", CONTEXT_HEADER, blocks.join(BLOCK_SEPARATOR))
    }
}

impl Default for ContextFormatter {
    fn default() -> Self {
        Self::from_config(&ContextConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lore_core::{Chunk, MatchKind};

    use super::*;
    use crate::embedding::Embedder;

    fn result(kind: &str, name: &str, text: &str, score: f64) -> ScoredResult {
        ScoredResult {
            chunk: Arc::new(Chunk::new(name, text, kind, name)),
            score,
            match_kind: MatchKind::Lexical,
            matched_terms: Vec::new(),
        }
    }

    #[test]
    fn test_render_block() {
        let block = render_block(&result("military", "Iron Legion", "Ten thousand strong.", 0.9));
        assert_eq!(block, "[MILITARY: Iron Legion]\nTen thousand strong.\n");
    }

    #[test]
    fn test_assemble_joins_blocks() {
        let results = vec![
            result("place", "Harrowgate", "A walled city.", 0.9),
            result("character", "Aria", "A smuggler.", 0.5),
        ];
        let context = ContextFormatter::new(2000).assemble(&results);
        assert_eq!(
            context,
            "RELEVANT CONTEXT FROM PROJECT:\n\n\
             [PLACE: Harrowgate]\nA walled city.\n\
             \n---\n\
             [CHARACTER: Aria]\nA smuggler.\n"
        );
    }

    #[test]
    fn test_assemble_stops_at_first_misfit() {
        let long = "x".repeat(400);
        let results = vec![
            result("place", "A", "short", 0.9),
            result("place", "B", &long, 0.8),
            result("place", "C", "tiny", 0.7),
        ];
        // Block A costs (11 + 5 + 1) / 4 = 4.25 tokens; B costs over 100.
        let context = ContextFormatter::new(50).assemble(&results);
        assert!(context.contains("[PLACE: A]"));
        assert!(!context.contains("[PLACE: B]"));
        assert!(!context.contains("[PLACE: C]"));
        assert!(!context.contains('x'));
    }

    #[test]
    fn test_assemble_nothing_fits() {
        let results = vec![result("place", "A", &"y".repeat(100), 0.9)];
        assert_eq!(ContextFormatter::new(5).assemble(&results), "");
        assert_eq!(ContextFormatter::new(5).assemble(&[]), "");
    }

    #[test]
    fn test_format_against_engine() {
        let engine = HybridSearchEngine::new(Embedder::Unavailable);
        engine
            .index_many(vec![
                Chunk::new("place_1", "The dragon flew over the castle", "place", "Harrowgate"),
                Chunk::new("place_2", "The castle was built by dwarves", "place", "Stonehold"),
            ])
            .unwrap();

        let context = ContextFormatter::default().format(&engine, "dragon").unwrap();
        assert!(context.starts_with(CONTEXT_HEADER));
        assert!(context.contains("[PLACE: Harrowgate]\nThe dragon flew over the castle\n"));
        assert!(!context.contains("Stonehold"));

        assert_eq!(ContextFormatter::default().format(&engine, "spaceship").unwrap(), "");
    }
}
