//! Lore core crate - shared domain types, errors, configuration, and the
//! collaborator interfaces consumed by the retrieval and memory crates.

pub mod config;
pub mod error;
pub mod hash;
pub mod source;
pub mod telemetry;
pub mod types;

pub use config::LoreConfig;
pub use error::{LoreError, Result};
pub use hash::content_hash;
pub use source::{ContentCatalog, ContentRecord, ContentSource};
pub use types::*;
