use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LoreError, Result};

/// Identifier of an indexed chunk. Unique within one index generation.
pub type ChunkId = String;

// =============================================================================
// Enums
// =============================================================================

/// Where a chunk of indexed text came from.
///
/// The known variants mirror the writing tool's domain objects. Hosts that
/// model something else (e.g. `creature`) use [`SourceKind::Other`]; it is
/// serialized as the bare string like every other variant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKind {
    Worldbuilding,
    Faction,
    Place,
    Technology,
    Culture,
    HistoricalEvent,
    Flora,
    Fauna,
    Myth,
    StarSystem,
    Army,
    Economy,
    PoliticalSystem,
    Character,
    Plot,
    PlotEvent,
    Subplot,
    Themes,
    Promise,
    Chapter,
    ChapterKeyPoint,
    Other(String),
}

impl SourceKind {
    /// Stable snake_case tag of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            SourceKind::Worldbuilding => "worldbuilding",
            SourceKind::Faction => "faction",
            SourceKind::Place => "place",
            SourceKind::Technology => "technology",
            SourceKind::Culture => "culture",
            SourceKind::HistoricalEvent => "historical_event",
            SourceKind::Flora => "flora",
            SourceKind::Fauna => "fauna",
            SourceKind::Myth => "myth",
            SourceKind::StarSystem => "star_system",
            SourceKind::Army => "military",
            SourceKind::Economy => "economy",
            SourceKind::PoliticalSystem => "political_system",
            SourceKind::Character => "character",
            SourceKind::Plot => "plot",
            SourceKind::PlotEvent => "plot_event",
            SourceKind::Subplot => "subplot",
            SourceKind::Themes => "themes",
            SourceKind::Promise => "promise",
            SourceKind::Chapter => "chapter",
            SourceKind::ChapterKeyPoint => "chapter_key_point",
            SourceKind::Other(tag) => tag,
        }
    }

    /// Metadata keys a chunk of this kind may carry.
    ///
    /// `None` means the kind is host-defined and accepts any key.
    pub fn allowed_meta_keys(&self) -> Option<&'static [MetaKey]> {
        use MetaKey::*;
        let keys: &'static [MetaKey] = match self {
            SourceKind::Worldbuilding | SourceKind::Plot | SourceKind::Themes => &[],
            SourceKind::Faction => &[FactionType, Leader, Allies, Enemies],
            SourceKind::Place => &[PlaceType, Planet, ControllingFaction],
            SourceKind::Technology => &[TechType, ImpactLevel, Factions],
            SourceKind::Culture => &[Factions],
            SourceKind::HistoricalEvent => &[Year, EventType, Factions],
            SourceKind::Flora => &[FloraType],
            SourceKind::Fauna => &[FaunaType, DangerLevel],
            SourceKind::Myth => &[MythType, Factions],
            SourceKind::StarSystem => &[SystemType, ControllingFaction],
            SourceKind::Army => &[Faction],
            SourceKind::Economy => &[EconomyType],
            SourceKind::PoliticalSystem => &[GovernmentType],
            SourceKind::Character => &[CharacterType],
            SourceKind::PlotEvent => &[Stage, Act],
            SourceKind::Subplot => &[Status],
            SourceKind::Promise => &[PromiseType],
            SourceKind::Chapter => &[ChapterId],
            SourceKind::ChapterKeyPoint => &[PointType, Importance, ChapterId],
            SourceKind::Other(_) => return None,
        };
        Some(keys)
    }

    /// Whether `key` may be attached to a chunk of this kind.
    pub fn accepts(&self, key: MetaKey) -> bool {
        self.allowed_meta_keys()
            .map_or(true, |keys| keys.contains(&key))
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for SourceKind {
    fn from(tag: &str) -> Self {
        match tag {
            "worldbuilding" => SourceKind::Worldbuilding,
            "faction" => SourceKind::Faction,
            "place" => SourceKind::Place,
            "technology" => SourceKind::Technology,
            "culture" => SourceKind::Culture,
            "historical_event" => SourceKind::HistoricalEvent,
            "flora" => SourceKind::Flora,
            "fauna" => SourceKind::Fauna,
            "myth" => SourceKind::Myth,
            "star_system" => SourceKind::StarSystem,
            "military" => SourceKind::Army,
            "economy" => SourceKind::Economy,
            "political_system" => SourceKind::PoliticalSystem,
            "character" => SourceKind::Character,
            "plot" => SourceKind::Plot,
            "plot_event" => SourceKind::PlotEvent,
            "subplot" => SourceKind::Subplot,
            "themes" => SourceKind::Themes,
            "promise" => SourceKind::Promise,
            "chapter" => SourceKind::Chapter,
            "chapter_key_point" => SourceKind::ChapterKeyPoint,
            other => SourceKind::Other(other.to_string()),
        }
    }
}

impl From<String> for SourceKind {
    fn from(tag: String) -> Self {
        SourceKind::from(tag.as_str())
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Closed set of metadata keys a chunk may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaKey {
    FactionType,
    Leader,
    Allies,
    Enemies,
    PlaceType,
    Planet,
    ControllingFaction,
    TechType,
    ImpactLevel,
    Factions,
    Year,
    EventType,
    FloraType,
    FaunaType,
    DangerLevel,
    MythType,
    SystemType,
    Faction,
    EconomyType,
    GovernmentType,
    CharacterType,
    Stage,
    Act,
    Status,
    PromiseType,
    PointType,
    Importance,
    ChapterId,
}

/// Typed metadata map attached to a chunk.
pub type Metadata = BTreeMap<MetaKey, String>;

/// Which sub-indices a search consults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    /// Lexical matching over the TF-IDF index.
    Keyword,
    /// TF-IDF cosine similarity (same index as `Keyword`).
    Tfidf,
    /// Embedding similarity only.
    Embedding,
    /// Both indices, overlapping hits merged.
    #[default]
    Hybrid,
}

impl SearchMethod {
    /// Whether this method consults the TF-IDF index.
    pub fn uses_lexical(self) -> bool {
        matches!(
            self,
            SearchMethod::Keyword | SearchMethod::Tfidf | SearchMethod::Hybrid
        )
    }

    /// Whether this method consults the embedding index.
    pub fn uses_semantic(self) -> bool {
        matches!(self, SearchMethod::Embedding | SearchMethod::Hybrid)
    }
}

impl FromStr for SearchMethod {
    type Err = LoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "keyword" => Ok(SearchMethod::Keyword),
            "tfidf" | "lexical" => Ok(SearchMethod::Tfidf),
            "embedding" | "semantic" => Ok(SearchMethod::Embedding),
            "hybrid" => Ok(SearchMethod::Hybrid),
            other => Err(LoreError::Config(format!("unknown search method: {}", other))),
        }
    }
}

/// Which sub-index produced a scored result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Lexical,
    Semantic,
    Hybrid,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Lexical => "lexical",
            MatchKind::Semantic => "semantic",
            MatchKind::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Structs
// =============================================================================

/// A small unit of indexed text with stable identity and a source tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk identifier.
    pub id: ChunkId,
    /// The text payload.
    pub text: String,
    /// Domain kind of the originating object.
    pub kind: SourceKind,
    /// Human-readable name of the originating object.
    pub source_name: String,
    /// Stable id of the originating object.
    pub source_id: String,
    /// Typed metadata, restricted to the keys `kind` accepts.
    #[serde(default)]
    pub metadata: Metadata,
    /// Precomputed embedding, if the producer already has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Create a chunk with no metadata and no precomputed embedding.
    pub fn new(
        id: impl Into<ChunkId>,
        text: impl Into<String>,
        kind: impl Into<SourceKind>,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            kind: kind.into(),
            source_name: source_name.into(),
            source_id: String::new(),
            metadata: Metadata::new(),
            embedding: None,
        }
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }

    /// Attach a metadata value, rejecting keys the chunk's kind does not accept.
    pub fn with_meta(mut self, key: MetaKey, value: impl Into<String>) -> Result<Self> {
        self.insert_meta(key, value)?;
        Ok(self)
    }

    /// In-place form of [`Chunk::with_meta`].
    pub fn insert_meta(&mut self, key: MetaKey, value: impl Into<String>) -> Result<()> {
        if !self.kind.accepts(key) {
            return Err(LoreError::Metadata {
                kind: self.kind.to_string(),
                key: serde_json::to_string(&key)?.trim_matches('"').to_string(),
            });
        }
        self.metadata.insert(key, value.into());
        Ok(())
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}
