// src/services/crawler.rs

//! Crawl client: detail-link discovery and keyword testing.
//!
//! Fetches seed pages, extracts canonical detail links through
//! configured CSS selectors and href filters, and tests detail pages
//! for keyword presence.

use std::collections::HashSet;

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, ExtractConfig};
use crate::utils::{http, resolve_url};

/// Interface the reconciliation engine crawls through.
///
/// `list_detail_links` surfaces transport failures as `Err` so the
/// caller's retry policy can drive re-attempts. `check_keyword` is a
/// single attempt; its failures are folded into the message slot so
/// the engine always has something to write into the run column.
#[async_trait]
pub trait CrawlClient: Send + Sync {
    /// Discover canonical detail-page URLs on a seed page. May return
    /// an empty list.
    async fn list_detail_links(&self, seed_url: &str) -> Result<Vec<String>>;

    /// Test a detail page for the keyword. Returns (found, error).
    async fn check_keyword(&self, detail_url: &str) -> (bool, Option<String>);
}

/// HTTP-backed crawl client using reqwest and scraper.
pub struct HttpCrawler {
    client: reqwest::Client,
    keyword: String,
    link_selector: Selector,
    href_contains: Vec<String>,
    scope_selector: Option<Selector>,
}

impl HttpCrawler {
    /// Build a crawler from the crawler and extraction config sections.
    pub fn new(crawler: &CrawlerConfig, extract: &ExtractConfig) -> Result<Self> {
        let client = http::create_async_client(crawler)?;
        let link_selector = parse_selector(&extract.link_selector)?;
        let scope_selector = extract
            .scope_selector
            .as_deref()
            .map(parse_selector)
            .transpose()?;

        Ok(Self {
            client,
            keyword: extract.keyword.clone(),
            link_selector,
            href_contains: extract.href_contains.clone(),
            scope_selector,
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let text = self.client.get(url).send().await?.text().await?;
        Ok(text)
    }
}

#[async_trait]
impl CrawlClient for HttpCrawler {
    async fn list_detail_links(&self, seed_url: &str) -> Result<Vec<String>> {
        let base = Url::parse(seed_url)
            .map_err(|e| AppError::crawl(seed_url.to_string(), e))?;
        let html = self.fetch_text(seed_url).await?;

        Ok(extract_detail_links(
            &html,
            &self.link_selector,
            &self.href_contains,
            &base,
        ))
    }

    async fn check_keyword(&self, detail_url: &str) -> (bool, Option<String>) {
        match self.fetch_text(detail_url).await {
            Ok(html) => {
                let found =
                    page_contains_keyword(&html, &self.keyword, self.scope_selector.as_ref());
                (found, None)
            }
            Err(e) => (false, Some(e.to_string())),
        }
    }
}

/// Extract detail links from a seed page.
///
/// An href qualifies when it contains every configured substring.
/// Relative hrefs are resolved against the seed URL; duplicates are
/// dropped while preserving first-seen order.
pub fn extract_detail_links(
    html: &str,
    link_selector: &Selector,
    href_contains: &[String],
    base: &Url,
) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(link_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if !href_contains.iter().all(|pat| href.contains(pat.as_str())) {
            continue;
        }

        let resolved = resolve_url(base, href);
        if seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }

    links
}

/// Test a detail page's text for the keyword.
///
/// When a scope selector is configured and matches, only that
/// element's text is searched; otherwise the whole document text is.
pub fn page_contains_keyword(html: &str, keyword: &str, scope: Option<&Selector>) -> bool {
    let document = Html::parse_document(html);

    if let Some(selector) = scope {
        if let Some(element) = document.select(selector).next() {
            let text: String = element.text().collect();
            return text.contains(keyword);
        }
    }

    let text: String = document.root_element().text().collect();
    text.contains(keyword)
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
