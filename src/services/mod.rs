//! Service layer for the watch-log application.
//!
//! This module contains the I/O-facing logic:
//! - Catalog grid parsing (`parse_catalog`)
//! - Detail-link crawling and keyword testing (`CrawlClient`, `HttpCrawler`)

mod catalog;
mod crawler;

pub use catalog::parse_catalog;
pub use crawler::{CrawlClient, HttpCrawler};
