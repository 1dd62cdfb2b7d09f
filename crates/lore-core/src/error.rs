use thiserror::Error;

/// Top-level error type for the Lore workspace.
///
/// Ordinary empty or missing-data conditions (no matches, unknown ids, an
/// absent embedder) are never reported through this type. It carries
/// collaborator failures and configuration problems only.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Metadata key `{key}` is not accepted for source kind `{kind}`")]
    Metadata { kind: String, key: String },

    #[error("Content source error: {0}")]
    Source(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for LoreError {
    fn from(err: toml::de::Error) -> Self {
        LoreError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for LoreError {
    fn from(err: toml::ser::Error) -> Self {
        LoreError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for LoreError {
    fn from(err: serde_json::Error) -> Self {
        LoreError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Lore operations.
pub type Result<T> = std::result::Result<T, LoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoreError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(LoreError, &str)> = vec![
            (LoreError::Index("lock poisoned".into()), "Index error: lock poisoned"),
            (LoreError::Embedding("timeout".into()), "Embedding error: timeout"),
            (LoreError::Source("disk gone".into()), "Content source error: disk gone"),
            (
                LoreError::Serialization("invalid json".into()),
                "Serialization error: invalid json",
            ),
            (
                LoreError::Metadata {
                    kind: "character".into(),
                    key: "stage".into(),
                },
                "Metadata key `stage` is not accepted for source kind `character`",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let lore_err: LoreError = io_err.into();
        assert!(matches!(lore_err, LoreError::Io(_)));
        assert!(lore_err.to_string().starts_with("I/O error:"));
        assert!(lore_err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let lore_err: LoreError = err.unwrap_err().into();
        assert!(matches!(lore_err, LoreError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let lore_err: LoreError = err.unwrap_err().into();
        assert!(matches!(lore_err, LoreError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(format!("got {}", value))
        }

        assert_eq!(inner().unwrap(), "got 42");
    }
}
