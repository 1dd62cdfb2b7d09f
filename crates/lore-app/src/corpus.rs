//! JSON-backed project corpus used by the command line.
//!
//! One file provides both the indexable records and the chapter units the
//! memory manager tracks.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use lore_core::error::Result;
use lore_core::{ContentCatalog, ContentRecord, ContentSource};

/// One chapter (or other raw content unit) in reading order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    #[serde(default)]
    pub records: Vec<ContentRecord>,
    #[serde(default)]
    pub units: Vec<Unit>,
    /// Character and place names looked for in unit text.
    #[serde(default)]
    pub entities: Vec<String>,
}

impl Corpus {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let corpus: Corpus = serde_json::from_str(&raw)?;
        info!(
            path = %path.display(),
            records = corpus.records.len(),
            units = corpus.units.len(),
            "Corpus loaded"
        );
        Ok(corpus)
    }
}

impl ContentCatalog for Corpus {
    fn enumerate_content(&self) -> Vec<ContentRecord> {
        self.records.clone()
    }
}

impl ContentSource for Corpus {
    fn load_content(&self, id: &str) -> Result<Option<String>> {
        Ok(self
            .units
            .iter()
            .find(|unit| unit.id == id)
            .map(|unit| unit.text.clone()))
    }

    fn unit_order(&self) -> Vec<String> {
        self.units.iter().map(|unit| unit.id.clone()).collect()
    }

    fn entity_names(&self) -> Vec<String> {
        self.entities.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use lore_core::{LoreError, SourceKind};
    use tempfile::NamedTempFile;

    use super::*;

    const CORPUS: &str = r#"{
        "records": [
            {"id": "1", "text": "A walled harbor city.", "kind": "place", "name": "Harrowgate"},
            {"id": "7", "text": "Scaled and venomous.", "kind": "creature", "name": "Mire Drake"}
        ],
        "units": [
            {"id": "ch1", "text": "Aria arrived."},
            {"id": "ch2", "text": "Corin left."}
        ],
        "entities": ["Aria", "Corin"]
    }"#;

    fn write(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_corpus() {
        let file = write(CORPUS);
        let corpus = Corpus::load(file.path()).unwrap();

        let records = corpus.enumerate_content();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, SourceKind::Place);
        assert_eq!(records[1].kind, SourceKind::Other("creature".into()));
        assert!(records[0].metadata.is_empty());

        assert_eq!(corpus.unit_order(), vec!["ch1", "ch2"]);
        assert_eq!(corpus.load_content("ch2").unwrap().as_deref(), Some("Corin left."));
        assert_eq!(corpus.load_content("ch9").unwrap(), None);
        assert_eq!(corpus.entity_names().len(), 2);
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let file = write(r#"{"units": [{"id": "a", "text": "b"}]}"#);
        let corpus = Corpus::load(file.path()).unwrap();
        assert!(corpus.records.is_empty());
        assert!(corpus.entities.is_empty());
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        let file = write("{ records: nope");
        let err = Corpus::load(file.path()).unwrap_err();
        assert!(matches!(err, LoreError::Serialization(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Corpus::load(Path::new("/does/not/exist/corpus.json")).unwrap_err();
        assert!(matches!(err, LoreError::Io(_)));
    }
}
