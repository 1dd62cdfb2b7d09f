//! Interfaces the core consumes from the host application.
//!
//! The host maps its domain objects (characters, places, chapters) to plain
//! records and owns the backing store. The core never reaches past these
//! traits.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Metadata, SourceKind};

/// One indexable domain object, flattened to text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Stable id of the domain object.
    pub id: String,
    /// Text describing the object.
    pub text: String,
    /// Domain kind of the object.
    pub kind: SourceKind,
    /// Display name used in formatted context.
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Enumerates every indexable domain object of the current project.
pub trait ContentCatalog: Send + Sync {
    fn enumerate_content(&self) -> Vec<ContentRecord>;
}

/// Backing store for the raw content units (chapters) tracked by the memory
/// manager.
pub trait ContentSource: Send + Sync {
    /// Read the current text of a unit.
    ///
    /// `Ok(None)` means the id is unknown. Errors are propagated unchanged to
    /// the caller of the memory manager.
    fn load_content(&self, id: &str) -> Result<Option<String>>;

    /// Ids of all units in reading order. Used to find neighbours when
    /// preloading.
    fn unit_order(&self) -> Vec<String> {
        Vec::new()
    }

    /// Names of known entities (characters, places) to look for in content.
    fn entity_names(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<T: ContentCatalog + ?Sized> ContentCatalog for std::sync::Arc<T> {
    fn enumerate_content(&self) -> Vec<ContentRecord> {
        (**self).enumerate_content()
    }
}

impl<T: ContentSource + ?Sized> ContentSource for std::sync::Arc<T> {
    fn load_content(&self, id: &str) -> Result<Option<String>> {
        (**self).load_content(id)
    }

    fn unit_order(&self) -> Vec<String> {
        (**self).unit_order()
    }

    fn entity_names(&self) -> Vec<String> {
        (**self).entity_names()
    }
}
