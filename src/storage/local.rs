//! Local filesystem storage implementation.
//!
//! Persists the watch log as a single JSON document for development
//! and testing. Production deployments swap in a spreadsheet-backed
//! implementation of [`LogStore`].
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml           # Application configuration
//! ├── catalog.json          # Source catalog grid (array of rows)
//! └── log.json              # Watch log: {"header": [...], "rows": [[...]]}
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{LogStore, SheetData, StoredRow};

/// On-disk shape of `log.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LogDocument {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
}

impl LocalStore {
    const LOG_FILE: &'static str = "log.json";
    const CATALOG_FILE: &'static str = "catalog.json";

    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn read_document(&self) -> Result<LogDocument> {
        Ok(self
            .read_json::<LogDocument>(Self::LOG_FILE)
            .await?
            .unwrap_or_default())
    }

    /// Load the source catalog grid from `catalog.json`.
    ///
    /// The grid mirrors the source spreadsheet: an array of rows, each
    /// an array of string cells.
    pub async fn load_catalog_grid(&self) -> Result<Vec<Vec<String>>> {
        self.read_json::<Vec<Vec<String>>>(Self::CATALOG_FILE)
            .await?
            .ok_or_else(|| {
                AppError::catalog(format!(
                    "catalog not found at {}",
                    self.path(Self::CATALOG_FILE).display()
                ))
            })
    }
}

#[async_trait]
impl LogStore for LocalStore {
    async fn read(&self) -> Result<SheetData> {
        let doc = self.read_document().await?;
        let rows = doc
            .rows
            .into_iter()
            .enumerate()
            // Header occupies row 1, so data rows start at 2
            .map(|(i, cells)| StoredRow {
                position: i + 2,
                cells,
            })
            .collect();

        Ok(SheetData {
            header: doc.header,
            rows,
        })
    }

    async fn delete_rows(&self, positions: &[usize]) -> Result<()> {
        if positions.is_empty() {
            return Ok(());
        }

        let mut doc = self.read_document().await?;
        for &position in positions {
            if position < 2 {
                return Err(AppError::store(
                    "delete_rows",
                    format!("position {position} addresses the header or is out of range"),
                ));
            }
            let idx = position - 2;
            if idx >= doc.rows.len() {
                return Err(AppError::store(
                    "delete_rows",
                    format!("position {position} is beyond the last row"),
                ));
            }
            doc.rows.remove(idx);
        }

        self.write_json(Self::LOG_FILE, &doc).await
    }

    async fn write(&self, header: &[String], rows: &[Vec<String>]) -> Result<()> {
        let doc = LogDocument {
            header: header.to_vec(),
            rows: rows.to_vec(),
        };
        self.write_json(Self::LOG_FILE, &doc).await
    }
}
