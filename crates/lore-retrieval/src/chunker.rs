//! Turns catalog records into indexable chunks.
//!
//! A record that fits the character budget becomes one chunk with id
//! `<kind>_<source_id>`. Longer records are split on blank lines, one chunk
//! per paragraph, and a paragraph that alone exceeds the budget is cut on
//! word boundaries with some words of overlap. Parts are numbered
//! `<kind>_<source_id>#<n>`.

use tracing::{debug, warn};

use lore_core::config::RetrievalConfig;
use lore_core::{Chunk, ContentRecord, SourceKind};

/// Chunk id for a whole record.
pub fn chunk_id(kind: &SourceKind, source_id: &str) -> String {
    format!("{}_{}", kind, source_id)
}

#[derive(Debug, Clone)]
pub struct Chunker {
    max_chars: usize,
    overlap_words: usize,
}

impl Chunker {
    pub fn new(max_chars: usize, overlap_words: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
            overlap_words,
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.chunk_max_chars, config.chunk_overlap_words)
    }

    /// Chunk every record, in order.
    pub fn chunk_records<'a, I>(&self, records: I) -> Vec<Chunk>
    where
        I: IntoIterator<Item = &'a ContentRecord>,
    {
        records
            .into_iter()
            .flat_map(|record| self.chunk_record(record))
            .collect()
    }

    /// Chunk a single record. Records with blank text produce nothing.
    pub fn chunk_record(&self, record: &ContentRecord) -> Vec<Chunk> {
        let text = record.text.trim();
        if text.is_empty() {
            debug!(source_id = %record.id, "empty record skipped");
            return Vec::new();
        }

        let base_id = chunk_id(&record.kind, &record.id);
        if text.chars().count() <= self.max_chars {
            return vec![self.make_chunk(record, base_id, text.to_string())];
        }

        let mut parts = Vec::new();
        for paragraph in text.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            if paragraph.chars().count() <= self.max_chars {
                parts.push(paragraph.to_string());
            } else {
                parts.extend(self.split_paragraph_with_overlap(paragraph));
            }
        }

        debug!(source_id = %record.id, parts = parts.len(), "record split");
        parts
            .into_iter()
            .enumerate()
            .map(|(n, part)| self.make_chunk(record, format!("{}#{}", base_id, n), part))
            .collect()
    }

    fn make_chunk(&self, record: &ContentRecord, id: String, text: String) -> Chunk {
        let mut chunk =
            Chunk::new(id, text, record.kind.clone(), record.name.clone()).with_source_id(&record.id);
        for (key, value) in &record.metadata {
            if let Err(e) = chunk.insert_meta(*key, value.clone()) {
                warn!(source_id = %record.id, error = %e, "metadata dropped");
            }
        }
        chunk
    }

    /// Windows of whole words, each at most `max_chars` long (a single word
    /// longer than that forms its own window), consecutive windows sharing
    /// `overlap_words` words.
    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let mut windows = Vec::new();
        let mut start = 0;

        while start < words.len() {
            let mut end = start;
            let mut len = 0;
            while end < words.len() {
                let added = words[end].chars().count() + usize::from(end > start);
                if end > start && len + added > self.max_chars {
                    break;
                }
                len += added;
                end += 1;
            }

            windows.push(words[start..end].join(" "));
            if end >= words.len() {
                break;
            }
            start = end.saturating_sub(self.overlap_words).max(start + 1);
        }

        windows
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}
