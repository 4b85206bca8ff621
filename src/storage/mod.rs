//! Storage abstraction for the persisted watch log.
//!
//! The log lives in a tabular document: row 1 is the header, each
//! following row is one tracked (entry, detail-link) pair. The store
//! exposes exactly the three primitives the reconciliation engine
//! needs: a full read, a batched row deletion by absolute position,
//! and a full-body overwrite.

pub mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// Re-export for convenience
pub use local::LocalStore;

/// A data row as read from the store, tagged with its storage position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredRow {
    /// 1-based row number within the document (header is row 1)
    pub position: usize,
    /// Raw cell values
    pub cells: Vec<String>,
}

/// Full contents of the log document.
#[derive(Debug, Clone, Default)]
pub struct SheetData {
    /// Header labels; empty when the log has never been written
    pub header: Vec<String>,
    /// Data rows in storage order
    pub rows: Vec<StoredRow>,
}

/// Trait for watch-log storage backends.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Read the full log: header plus all data rows with positions.
    async fn read(&self) -> Result<SheetData>;

    /// Delete the rows at the given 1-based positions as one batch.
    ///
    /// Callers must pass positions in descending order; each deletion
    /// shifts the rows below it, so ascending order would invalidate
    /// the not-yet-applied positions. All remaining positions are
    /// invalidated afterward and must be re-read.
    async fn delete_rows(&self, positions: &[usize]) -> Result<()>;

    /// Overwrite the full log body with a header and data rows.
    async fn write(&self, header: &[String], rows: &[Vec<String>]) -> Result<()>;
}
