//! Watch-log row and header structures.
//!
//! The persisted log is a plain tabular sheet: identity columns first,
//! then one timestamped result column per run. The types here make the
//! two structural invariants mechanically checkable:
//!
//! - a row key is unique within the log at rest,
//! - every row's cell count equals the header's label count.

use serde::{Deserialize, Serialize};

use super::config::MarkerConfig;

/// Number of leading identity columns in the log.
pub const IDENTITY_COLUMNS: usize = 3;

/// Header labels for the identity columns.
pub fn identity_labels() -> Vec<String> {
    vec![
        "Name".to_string(),
        "Seed URL".to_string(),
        "Detail URL".to_string(),
    ]
}

/// Composite identity key for a log row.
///
/// Equality is exact string equality on all three fields. The detail
/// URL is empty for the synthetic row recorded when a seed URL yields
/// no detail links.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub name: String,
    pub seed_url: String,
    pub detail_url: String,
}

impl RowKey {
    pub fn new(
        name: impl Into<String>,
        seed_url: impl Into<String>,
        detail_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            seed_url: seed_url.into(),
            detail_url: detail_url.into(),
        }
    }

    /// Reconstruct the key from a stored row's leading cells.
    ///
    /// Returns `None` for rows too short to carry all identity fields;
    /// such rows can never match a current catalog entry.
    pub fn from_cells(cells: &[String]) -> Option<Self> {
        if cells.len() < IDENTITY_COLUMNS {
            return None;
        }
        Some(Self::new(
            cells[0].clone(),
            cells[1].clone(),
            cells[2].clone(),
        ))
    }
}

/// Ordered column labels: identity labels first, then accumulating
/// run-timestamp labels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogHeader(Vec<String>);

impl LogHeader {
    /// Wrap stored header labels, falling back to the identity labels
    /// when the log is empty.
    pub fn from_labels(labels: Vec<String>) -> Self {
        if labels.is_empty() {
            Self(identity_labels())
        } else {
            Self(labels)
        }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    /// Resolve the column index for a run label, appending a new
    /// column only if no column carries that label yet.
    ///
    /// On a label collision (same-granularity rerun) the first
    /// occurrence's index wins, so a retried run overwrites its own
    /// column instead of duplicating it.
    pub fn ensure_column(&mut self, label: &str) -> usize {
        match self.0.iter().position(|l| l == label) {
            Some(idx) => idx,
            None => {
                self.0.push(label.to_string());
                self.0.len() - 1
            }
        }
    }

    /// Label of the most recent run column, if any exists.
    pub fn last_run_label(&self) -> Option<&str> {
        if self.0.len() > IDENTITY_COLUMNS {
            self.0.last().map(|s| s.as_str())
        } else {
            None
        }
    }
}

/// One log row: identity cells followed by per-run result cells.
///
/// Cells are only ever grown via explicit padding; `set` pads before
/// writing so a result always lands at its label-resolved index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRow {
    cells: Vec<String>,
}

impl LogRow {
    /// Create a fresh row holding only the identity cells of a key.
    pub fn from_key(key: &RowKey) -> Self {
        Self {
            cells: vec![
                key.name.clone(),
                key.seed_url.clone(),
                key.detail_url.clone(),
            ],
        }
    }

    /// Wrap cells read from the store.
    pub fn from_cells(cells: Vec<String>) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<String> {
        self.cells
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.cells.get(idx).map(|s| s.as_str())
    }

    /// Pad the row with empty cells on the right up to `len`.
    pub fn pad_to(&mut self, len: usize) {
        while self.cells.len() < len {
            self.cells.push(String::new());
        }
    }

    /// Write a cell at a specific column index, padding as needed.
    pub fn set(&mut self, idx: usize, value: String) {
        self.pad_to(idx + 1);
        self.cells[idx] = value;
    }
}

/// Result of one keyword observation, the closed set of values a run
/// cell can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    /// Keyword was present on the detail page
    Found,
    /// Fetch or check failed; carries the underlying message
    Error(String),
    /// Seed URL yielded no detail links this run
    NoDetailLinks,
    /// Page checked, keyword absent (or no observation)
    Empty,
}

impl CellValue {
    /// Render the marker string written into the log cell.
    pub fn render(&self, markers: &MarkerConfig) -> String {
        match self {
            Self::Found => markers.found.clone(),
            Self::Error(msg) => format!("{}{}", markers.error_prefix, msg),
            Self::NoDetailLinks => markers.no_links.clone(),
            Self::Empty => String::new(),
        }
    }
}
