//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Check whether a string is a usable seed URL (HTTP or HTTPS scheme).
pub fn has_http_scheme(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}
