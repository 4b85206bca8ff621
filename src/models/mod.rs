// src/models/mod.rs

//! Domain models for the watch-log application.
//!
//! This module contains all data structures used throughout the
//! application, organized by their primary purpose.

mod catalog;
mod config;
mod log;

// Re-export all public types
pub use catalog::CatalogEntry;
pub use config::{CatalogColumns, Config, CrawlerConfig, ExtractConfig, MarkerConfig};
pub use log::{CellValue, IDENTITY_COLUMNS, LogHeader, LogRow, RowKey, identity_labels};
