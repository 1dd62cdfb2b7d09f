//! Summary derivation for content units.
//!
//! Derivation is a pure function of the unit's text and the known entity
//! names. `HeuristicSummarizer` is the keyword-driven default; hosts with a
//! language model can plug in their own [`SummaryDeriver`].

use std::collections::BTreeSet;

use chrono::Utc;

use lore_core::config::MemoryConfig;
use lore_core::content_hash;

use crate::types::{ContentSummary, KeyPoint, KeyPointKind};

/// Turns unit content into a [`ContentSummary`].
pub trait SummaryDeriver: Send + Sync {
    fn derive(&self, unit_id: &str, content: &str, entity_names: &[String]) -> ContentSummary;
}

const PLOT_KEYWORDS: &[&str] = &[
    "but then",
    "suddenly",
    "realized",
    "discovered",
    "revealed",
    "decided",
];

const CONFLICT_KEYWORDS: &[&str] = &["fought", "argued", "conflict", "battle", "struggled", "enemy"];

const ACTION_VERBS: &[&str] = &[
    "attacked",
    "escaped",
    "found",
    "lost",
    "died",
    "married",
    "betrayed",
    "saved",
    "killed",
    "revealed",
    "transformed",
];

const LOCATION_INDICATORS: &[&str] = &["in", "at", "to", "from", "near", "towards"];

/// Lines this short (after trimming) never yield key points.
const MIN_KEY_POINT_LINE_CHARS: usize = 21;
const MAX_KEY_POINT_CHARS: usize = 200;
const MIN_EVENT_CHARS: usize = 20;
const MAX_EVENT_CHARS: usize = 150;

/// Keyword-driven summarizer.
#[derive(Debug, Clone)]
pub struct HeuristicSummarizer {
    max_key_points: usize,
    max_plot_events: usize,
}

impl HeuristicSummarizer {
    pub fn new(max_key_points: usize, max_plot_events: usize) -> Self {
        Self {
            max_key_points,
            max_plot_events,
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.max_key_points, config.max_plot_events)
    }

    /// Per line: a plot keyword yields a plot point (importance 3), a
    /// conflict keyword a conflict point (importance 4). A line may yield
    /// both. Result is sorted by importance, stable, and capped.
    fn extract_key_points(&self, unit_id: &str, content: &str, entity_names: &[String]) -> Vec<KeyPoint> {
        let mut points = Vec::new();
        let mut next_id = 0;

        for (index, line) in content.split('\n').enumerate() {
            let trimmed = line.trim();
            let lowered = trimmed.to_lowercase();
            if lowered.chars().count() < MIN_KEY_POINT_LINE_CHARS {
                continue;
            }

            for (keywords, kind, importance) in [
                (PLOT_KEYWORDS, KeyPointKind::Plot, 3u8),
                (CONFLICT_KEYWORDS, KeyPointKind::Conflict, 4u8),
            ] {
                if keywords.iter().any(|k| lowered.contains(k)) {
                    points.push(KeyPoint {
                        id: format!("{}_kp_{}", unit_id, next_id),
                        unit_id: unit_id.to_string(),
                        content: truncate_chars(trimmed, MAX_KEY_POINT_CHARS),
                        kind,
                        importance,
                        characters_involved: mentioned(&lowered, entity_names),
                        line: index + 1,
                    });
                    next_id += 1;
                }
            }
        }

        points.sort_by(|a, b| b.importance.cmp(&a.importance));
        points.truncate(self.max_key_points);
        points
    }

    /// Sentences (split on `.`) of at least 20 characters containing an
    /// action verb, each cut to 150 characters.
    fn extract_plot_events(&self, content: &str) -> Vec<String> {
        content
            .replace('\n', " ")
            .split('.')
            .map(str::trim)
            .filter(|sentence| sentence.chars().count() >= MIN_EVENT_CHARS)
            .filter(|sentence| {
                let lowered = sentence.to_lowercase();
                ACTION_VERBS.iter().any(|verb| lowered.contains(verb))
            })
            .take(self.max_plot_events)
            .map(|sentence| truncate_chars(sentence, MAX_EVENT_CHARS))
            .collect()
    }
}

impl Default for HeuristicSummarizer {
    fn default() -> Self {
        Self::from_config(&MemoryConfig::default())
    }
}

impl SummaryDeriver for HeuristicSummarizer {
    fn derive(&self, unit_id: &str, content: &str, entity_names: &[String]) -> ContentSummary {
        let lowered = content.to_lowercase();
        ContentSummary {
            unit_id: unit_id.to_string(),
            word_count: content.split_whitespace().count(),
            key_points: self.extract_key_points(unit_id, content, entity_names),
            entities: mentioned(&lowered, entity_names).into_iter().collect(),
            locations: extract_locations(content),
            plot_events: self.extract_plot_events(content),
            content_hash: content_hash(content),
            analyzed_at: Some(Utc::now()),
        }
    }
}

/// Entity names occurring (case-insensitively) in already lower-cased text.
fn mentioned(lowered: &str, entity_names: &[String]) -> Vec<String> {
    entity_names
        .iter()
        .filter(|name| !name.trim().is_empty() && lowered.contains(&name.to_lowercase()))
        .cloned()
        .collect()
}

/// Capitalized words longer than two characters following a location
/// preposition, with surrounding punctuation stripped.
fn extract_locations(content: &str) -> BTreeSet<String> {
    let words: Vec<&str> = content.split_whitespace().collect();
    words
        .windows(2)
        .filter(|pair| LOCATION_INDICATORS.contains(&pair[0].to_lowercase().as_str()))
        .map(|pair| pair[1])
        .filter(|word| word.chars().count() > 2 && word.chars().next().is_some_and(char::is_uppercase))
        .map(|word| word.trim_matches(|c: char| ".,!?\";'".contains(c)).to_string())
        .filter(|word| !word.is_empty())
        .collect()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
