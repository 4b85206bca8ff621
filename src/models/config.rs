//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Detail-link extraction and keyword test settings
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Column positions within the source catalog grid
    #[serde(default)]
    pub catalog: CatalogColumns,

    /// Marker strings written into result cells
    #[serde(default)]
    pub markers: MarkerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.retry_attempts == 0 {
            return Err(AppError::validation("crawler.retry_attempts must be > 0"));
        }
        if self.extract.keyword.is_empty() {
            return Err(AppError::validation("extract.keyword is empty"));
        }
        if self.extract.link_selector.trim().is_empty() {
            return Err(AppError::validation("extract.link_selector is empty"));
        }
        if self.extract.label_format.trim().is_empty() {
            return Err(AppError::validation("extract.label_format is empty"));
        }
        if self.catalog.name_column == self.catalog.url_column {
            return Err(AppError::validation(
                "catalog.name_column and catalog.url_column must differ",
            ));
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts for detail-link resolution before degrading to an
    /// error marker
    #[serde(default = "defaults::retry_attempts")]
    pub retry_attempts: u32,

    /// Delay between retry attempts in milliseconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,

    /// Delay between catalog entries in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            retry_attempts: defaults::retry_attempts(),
            retry_delay_ms: defaults::retry_delay(),
            request_delay_ms: defaults::request_delay(),
        }
    }
}

/// Detail-link extraction and keyword test settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Keyword tested for on each detail page
    #[serde(default = "defaults::keyword")]
    pub keyword: String,

    /// CSS selector matching candidate link elements on a seed page
    #[serde(default = "defaults::link_selector")]
    pub link_selector: String,

    /// Substrings an href must all contain to count as a detail link
    #[serde(default = "defaults::href_contains")]
    pub href_contains: Vec<String>,

    /// CSS selector scoping the keyword test; falls back to the whole
    /// document text when absent or unmatched
    #[serde(default = "defaults::scope_selector")]
    pub scope_selector: Option<String>,

    /// chrono format string for the run-timestamp column label
    #[serde(default = "defaults::label_format")]
    pub label_format: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            keyword: defaults::keyword(),
            link_selector: defaults::link_selector(),
            href_contains: defaults::href_contains(),
            scope_selector: defaults::scope_selector(),
            label_format: defaults::label_format(),
        }
    }
}

/// Column positions within the source catalog grid (0-based).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogColumns {
    /// Column holding the listing name
    #[serde(default)]
    pub name_column: usize,

    /// Optional column holding the room identifier
    #[serde(default)]
    pub room_column: Option<usize>,

    /// Column holding the seed URL
    #[serde(default = "defaults::url_column")]
    pub url_column: usize,
}

impl Default for CatalogColumns {
    fn default() -> Self {
        Self {
            name_column: 0,
            room_column: None,
            url_column: defaults::url_column(),
        }
    }
}

/// Marker strings written into result cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Written when the keyword is present on the page
    #[serde(default = "defaults::found_marker")]
    pub found: String,

    /// Prefix for failure messages
    #[serde(default = "defaults::error_prefix")]
    pub error_prefix: String,

    /// Written when a seed URL yields no detail links
    #[serde(default = "defaults::no_links_marker")]
    pub no_links: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            found: defaults::found_marker(),
            error_prefix: defaults::error_prefix(),
            no_links: defaults::no_links_marker(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; listwatch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn retry_attempts() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        1000
    }
    pub fn request_delay() -> u64 {
        100
    }

    // Extraction defaults
    pub fn keyword() -> String {
        "えほうまき".into()
    }
    pub fn link_selector() -> String {
        "a[href]".into()
    }
    pub fn href_contains() -> Vec<String> {
        vec!["/chintai/".into(), "jnc_".into()]
    }
    pub fn scope_selector() -> Option<String> {
        Some(".viewform_advance_shop-name".into())
    }
    pub fn label_format() -> String {
        "%Y/%m/%d %H:%M".into()
    }

    // Catalog defaults
    pub fn url_column() -> usize {
        9
    }

    // Marker defaults
    pub fn found_marker() -> String {
        "FOUND".into()
    }
    pub fn error_prefix() -> String {
        "ERROR: ".into()
    }
    pub fn no_links_marker() -> String {
        "NO DETAIL LINKS FOUND".into()
    }
}
