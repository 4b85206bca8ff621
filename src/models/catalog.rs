//! Catalog entry data structure.

use serde::{Deserialize, Serialize};

/// One tracked listing from the source catalog.
///
/// Entries are re-derived fresh every run and never mutated; an entry
/// vanishing between runs triggers deletion of its log rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Display name of the listing
    pub name: String,

    /// Optional room identifier (display only, not part of row identity)
    pub room: Option<String>,

    /// Page to crawl for canonical detail links; always starts with
    /// an HTTP(S) scheme
    pub seed_url: String,
}

impl CatalogEntry {
    /// Create an entry without a room identifier.
    pub fn new(name: impl Into<String>, seed_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            room: None,
            seed_url: seed_url.into(),
        }
    }
}
