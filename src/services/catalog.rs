//! Source catalog parsing.
//!
//! The catalog arrives as a raw tabular grid (rows of string cells)
//! mirroring the source spreadsheet. Columns are positional; rows
//! lacking a name or a qualifying HTTP(S) URL are silently skipped.

use crate::models::{CatalogColumns, CatalogEntry};
use crate::utils::has_http_scheme;

/// Parse the raw catalog grid into tracked entries.
///
/// Duplicates are not collapsed here; the reconciliation engine merges
/// them by identity key.
pub fn parse_catalog(grid: &[Vec<String>], columns: &CatalogColumns) -> Vec<CatalogEntry> {
    let mut entries = Vec::new();

    for row in grid {
        let name = cell(row, columns.name_column);
        let url = cell(row, columns.url_column);

        if name.is_empty() || !has_http_scheme(url) {
            continue;
        }

        let room = columns
            .room_column
            .map(|idx| cell(row, idx))
            .filter(|r| !r.is_empty())
            .map(|r| r.to_string());

        entries.push(CatalogEntry {
            name: name.to_string(),
            room,
            seed_url: url.to_string(),
        });
    }

    entries
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.trim()).unwrap_or("")
}
