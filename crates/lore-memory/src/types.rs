use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of fact a key point records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPointKind {
    Character,
    Plot,
    Setting,
    Conflict,
    Theme,
    Foreshadowing,
}

impl KeyPointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Plot => "plot",
            Self::Setting => "setting",
            Self::Conflict => "conflict",
            Self::Theme => "theme",
            Self::Foreshadowing => "foreshadowing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "character" => Some(Self::Character),
            "plot" => Some(Self::Plot),
            "setting" => Some(Self::Setting),
            "conflict" => Some(Self::Conflict),
            "theme" => Some(Self::Theme),
            "foreshadowing" => Some(Self::Foreshadowing),
            _ => None,
        }
    }

    /// Display label, e.g. `Foreshadowing`.
    pub fn title(&self) -> String {
        let s = self.as_str();
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    }
}

impl fmt::Display for KeyPointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One importance-ranked fact extracted from a content unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    /// `<unit_id>_kp_<n>`.
    pub id: String,
    /// Unit the point was extracted from.
    pub unit_id: String,
    /// Source line, at most 200 characters.
    pub content: String,
    #[serde(rename = "point_type")]
    pub kind: KeyPointKind,
    /// 1-5, higher is more important.
    pub importance: u8,
    #[serde(default)]
    pub characters_involved: Vec<String>,
    /// 1-based line number within the unit.
    #[serde(default)]
    pub line: usize,
}

/// Facts derived from one content unit, keyed by its stable id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSummary {
    pub unit_id: String,
    pub word_count: usize,
    #[serde(default)]
    pub key_points: Vec<KeyPoint>,
    /// Known entity names mentioned in the content.
    #[serde(default)]
    pub entities: BTreeSet<String>,
    #[serde(default)]
    pub locations: BTreeSet<String>,
    #[serde(default)]
    pub plot_events: Vec<String>,
    /// SHA-256 hex of the content the summary was derived from.
    #[serde(default)]
    pub content_hash: String,
    #[serde(default)]
    pub analyzed_at: Option<DateTime<Utc>>,
}
