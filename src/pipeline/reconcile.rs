// src/pipeline/reconcile.rs

//! Reconciliation engine.
//!
//! Produces the next log state from the current catalog, the persisted
//! log, and fresh crawl results, then persists it:
//!
//! 1. delete rows whose entry left the catalog (descending positions),
//! 2. re-read the log so no stale position is ever reused,
//! 3. admit the run-timestamp column (reusing it on a same-label rerun),
//! 4. crawl each entry and merge results by identity key,
//! 5. pad every row to the header length,
//! 6. flush header + rows as one overwrite.
//!
//! A crawl failure for one entry degrades to an error marker in that
//! entry's cell; it never aborts the run. Log store failures abort.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::{
    CatalogEntry, CellValue, Config, IDENTITY_COLUMNS, LogHeader, LogRow, MarkerConfig, RowKey,
};
use crate::pipeline::RetryPolicy;
use crate::services::CrawlClient;
use crate::storage::{LogStore, StoredRow};

/// Summary of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    /// Run-timestamp column label
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Catalog entries processed
    pub entries: usize,
    /// Detail pages fetched for keyword checks
    pub links_checked: usize,
    /// Cells recorded with the found marker
    pub found: usize,
    /// Cells recorded with an error marker
    pub errors: usize,
    /// Entries whose seed URL yielded no detail links
    pub no_link_entries: usize,
    /// Rows deleted because their entry left the catalog
    pub stale_deleted: usize,
    /// Rows in the flushed log body
    pub rows_written: usize,
}

/// Engine for one reconciliation pass over catalog and log.
pub struct Reconciler {
    markers: MarkerConfig,
    retry: RetryPolicy,
    label_format: String,
    request_delay: Duration,
}

impl Reconciler {
    /// Build the engine from application configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            markers: config.markers.clone(),
            retry: RetryPolicy::from_config(&config.crawler),
            label_format: config.extract.label_format.clone(),
            request_delay: Duration::from_millis(config.crawler.request_delay_ms),
        }
    }

    /// Run one reconciliation pass with a label derived from the
    /// current wall-clock time.
    ///
    /// The label is computed once here and threaded through the whole
    /// pass, so a run straddling a label-granularity boundary still
    /// writes a single column.
    pub async fn run(
        &self,
        entries: &[CatalogEntry],
        crawler: &dyn CrawlClient,
        store: &dyn LogStore,
    ) -> Result<RunStats> {
        let label = Local::now().format(&self.label_format).to_string();
        self.run_with_label(&label, entries, crawler, store).await
    }

    /// Run one reconciliation pass under an explicit run label.
    pub async fn run_with_label(
        &self,
        label: &str,
        entries: &[CatalogEntry],
        crawler: &dyn CrawlClient,
        store: &dyn LogStore,
    ) -> Result<RunStats> {
        let started_at = Utc::now();
        log::info!("Reconciliation run '{}' starting ({} entries)", label, entries.len());

        // Stale pass: rows whose (name, seed URL) left the catalog.
        let sheet = store.read().await?;
        let active: HashSet<(&str, &str)> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.seed_url.as_str()))
            .collect();

        let mut stale: Vec<usize> = sheet
            .rows
            .iter()
            .filter(|row| is_stale(row, &active))
            .map(|row| row.position)
            .collect();
        let stale_deleted = stale.len();

        if !stale.is_empty() {
            // Descending order: deleting a row shifts everything below
            // it, which would invalidate not-yet-applied positions.
            stale.sort_unstable_by(|a, b| b.cmp(a));
            log::info!("Deleting {} stale rows", stale.len());
            store.delete_rows(&stale).await?;
        }

        // The deletion shifted surviving rows; every position from the
        // first read is now invalid, so reload before merging.
        let sheet = store.read().await?;
        let mut header = LogHeader::from_labels(sheet.header);
        let column = header.ensure_column(label);

        let mut snapshot: HashMap<RowKey, LogRow> = HashMap::new();
        for stored in sheet.rows {
            let mut row = LogRow::from_cells(stored.cells);
            row.pad_to(IDENTITY_COLUMNS);
            let Some(key) = RowKey::from_cells(row.cells()) else {
                continue;
            };
            snapshot.entry(key).or_insert(row);
        }

        let mut stats = RunStats {
            label: label.to_string(),
            started_at,
            finished_at: started_at,
            entries: entries.len(),
            links_checked: 0,
            found: 0,
            errors: 0,
            no_link_entries: 0,
            stale_deleted,
            rows_written: 0,
        };

        for (i, entry) in entries.iter().enumerate() {
            if i > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
            self.process_entry(entry, crawler, &mut snapshot, column, &mut stats)
                .await;
        }

        // Row-length invariant: every row as wide as the header.
        let mut merged: Vec<(RowKey, LogRow)> = snapshot.into_iter().collect();
        merged.sort_by(|a, b| a.0.cmp(&b.0));

        let rows: Vec<Vec<String>> = merged
            .into_iter()
            .map(|(_, mut row)| {
                row.pad_to(header.len());
                row.into_cells()
            })
            .collect();
        stats.rows_written = rows.len();

        store.write(header.labels(), &rows).await?;

        stats.finished_at = Utc::now();
        log::info!(
            "Run '{}' complete: {} rows written, {} found, {} errors, {} stale deleted",
            stats.label,
            stats.rows_written,
            stats.found,
            stats.errors,
            stats.stale_deleted
        );
        Ok(stats)
    }

    /// Crawl one catalog entry and merge its results into the snapshot.
    ///
    /// Never fails: crawl errors become error markers in the entry's
    /// cells so the run can continue with the remaining entries.
    async fn process_entry(
        &self,
        entry: &CatalogEntry,
        crawler: &dyn CrawlClient,
        snapshot: &mut HashMap<RowKey, LogRow>,
        column: usize,
        stats: &mut RunStats,
    ) {
        let links = self
            .retry
            .run(|_attempt| crawler.list_detail_links(&entry.seed_url))
            .await;

        let links = match links {
            Ok(links) => links,
            Err(e) => {
                log::warn!("Link resolution failed for {}: {}", entry.seed_url, e);
                stats.errors += 1;
                self.record(
                    snapshot,
                    RowKey::new(&entry.name, &entry.seed_url, ""),
                    column,
                    CellValue::Error(e.to_string()),
                );
                return;
            }
        };

        if links.is_empty() {
            log::debug!("No detail links found on {}", entry.seed_url);
            stats.no_link_entries += 1;
            self.record(
                snapshot,
                RowKey::new(&entry.name, &entry.seed_url, ""),
                column,
                CellValue::NoDetailLinks,
            );
            return;
        }

        for link in links {
            let (found, error) = crawler.check_keyword(&link).await;
            stats.links_checked += 1;

            let value = if found {
                stats.found += 1;
                CellValue::Found
            } else if let Some(msg) = error {
                log::warn!("Keyword check failed for {}: {}", link, msg);
                stats.errors += 1;
                CellValue::Error(msg)
            } else {
                CellValue::Empty
            };

            self.record(
                snapshot,
                RowKey::new(&entry.name, &entry.seed_url, link),
                column,
                value,
            );
        }
    }

    /// Write a result into a row's cell at the label-resolved column,
    /// creating the row on first sight of its key.
    fn record(
        &self,
        snapshot: &mut HashMap<RowKey, LogRow>,
        key: RowKey,
        column: usize,
        value: CellValue,
    ) {
        let row = snapshot
            .entry(key)
            .or_insert_with_key(|k| LogRow::from_key(k));
        row.set(column, value.render(&self.markers));
    }
}

/// A stored row is stale when its leading (name, seed URL) cells do
/// not match any active catalog entry. Rows too short to carry both
/// cells can never match and are stale by the same rule.
fn is_stale(row: &StoredRow, active: &HashSet<(&str, &str)>) -> bool {
    match (row.cells.first(), row.cells.get(1)) {
        (Some(name), Some(seed)) => !active.contains(&(name.as_str(), seed.as_str())),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::AppError;
    use crate::storage::SheetData;

    /// In-memory log store that records each delete batch as issued.
    #[derive(Default)]
    struct FakeStore {
        state: Mutex<(Vec<String>, Vec<Vec<String>>)>,
        delete_batches: Mutex<Vec<Vec<usize>>>,
    }

    impl FakeStore {
        fn with_log(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
            Self {
                state: Mutex::new((header, rows)),
                delete_batches: Mutex::new(Vec::new()),
            }
        }

        fn header(&self) -> Vec<String> {
            self.state.lock().unwrap().0.clone()
        }

        fn rows(&self) -> Vec<Vec<String>> {
            self.state.lock().unwrap().1.clone()
        }

        fn row_for(&self, name: &str, detail_url: &str) -> Option<Vec<String>> {
            self.rows()
                .into_iter()
                .find(|r| r[0] == name && r[2] == detail_url)
        }
    }

    #[async_trait]
    impl LogStore for FakeStore {
        async fn read(&self) -> crate::error::Result<SheetData> {
            let (header, rows) = self.state.lock().unwrap().clone();
            Ok(SheetData {
                header,
                rows: rows
                    .into_iter()
                    .enumerate()
                    .map(|(i, cells)| StoredRow {
                        position: i + 2,
                        cells,
                    })
                    .collect(),
            })
        }

        async fn delete_rows(&self, positions: &[usize]) -> crate::error::Result<()> {
            self.delete_batches.lock().unwrap().push(positions.to_vec());
            let mut state = self.state.lock().unwrap();
            for &position in positions {
                state.1.remove(position - 2);
            }
            Ok(())
        }

        async fn write(
            &self,
            header: &[String],
            rows: &[Vec<String>],
        ) -> crate::error::Result<()> {
            *self.state.lock().unwrap() = (header.to_vec(), rows.to_vec());
            Ok(())
        }
    }

    /// Scripted crawl client.
    #[derive(Default)]
    struct FakeCrawler {
        /// seed URL -> detail links
        links: HashMap<String, Vec<String>>,
        /// detail URL -> (found, error)
        checks: HashMap<String, (bool, Option<String>)>,
        /// seed URLs whose link resolution always fails
        failing_seeds: HashSet<String>,
    }

    impl FakeCrawler {
        fn with_links(seed: &str, links: &[&str]) -> Self {
            let mut crawler = Self::default();
            crawler.add_links(seed, links);
            crawler
        }

        fn add_links(&mut self, seed: &str, links: &[&str]) {
            self.links
                .insert(seed.to_string(), links.iter().map(|l| l.to_string()).collect());
        }

        fn set_check(&mut self, url: &str, found: bool, error: Option<&str>) {
            self.checks
                .insert(url.to_string(), (found, error.map(|e| e.to_string())));
        }

        fn fail_seed(&mut self, seed: &str) {
            self.failing_seeds.insert(seed.to_string());
        }
    }

    #[async_trait]
    impl CrawlClient for FakeCrawler {
        async fn list_detail_links(&self, seed_url: &str) -> crate::error::Result<Vec<String>> {
            if self.failing_seeds.contains(seed_url) {
                return Err(AppError::crawl(seed_url.to_string(), "connection refused"));
            }
            Ok(self.links.get(seed_url).cloned().unwrap_or_default())
        }

        async fn check_keyword(&self, detail_url: &str) -> (bool, Option<String>) {
            self.checks
                .get(detail_url)
                .cloned()
                .unwrap_or((false, None))
        }
    }

    fn reconciler() -> Reconciler {
        let mut config = Config::default();
        config.crawler.retry_delay_ms = 0;
        config.crawler.request_delay_ms = 0;
        Reconciler::from_config(&config)
    }

    fn entry(name: &str, seed: &str) -> CatalogEntry {
        CatalogEntry::new(name, seed)
    }

    const LABEL_1: &str = "2026/08/29 09:00";
    const LABEL_2: &str = "2026/08/30 09:00";

    #[tokio::test]
    async fn test_empty_log_no_detail_links() {
        let store = FakeStore::default();
        let crawler = FakeCrawler::with_links("https://x/a", &[]);
        let entries = vec![entry("Acme Tower", "https://x/a")];

        let stats = reconciler()
            .run_with_label(LABEL_1, &entries, &crawler, &store)
            .await
            .unwrap();

        assert_eq!(stats.no_link_entries, 1);
        assert_eq!(stats.rows_written, 1);
        assert_eq!(
            store.header(),
            vec!["Name", "Seed URL", "Detail URL", LABEL_1]
        );
        assert_eq!(
            store.rows(),
            vec![vec![
                "Acme Tower".to_string(),
                "https://x/a".to_string(),
                "".to_string(),
                "NO DETAIL LINKS FOUND".to_string(),
            ]]
        );
    }

    #[tokio::test]
    async fn test_keyword_found_marker() {
        let store = FakeStore::default();
        let mut crawler = FakeCrawler::with_links("https://x/a", &["https://x/a/d1"]);
        crawler.set_check("https://x/a/d1", true, None);
        let entries = vec![entry("Acme Tower", "https://x/a")];

        let stats = reconciler()
            .run_with_label(LABEL_1, &entries, &crawler, &store)
            .await
            .unwrap();

        assert_eq!(stats.found, 1);
        let row = store.row_for("Acme Tower", "https://x/a/d1").unwrap();
        assert_eq!(row[3], "FOUND");
    }

    #[tokio::test]
    async fn test_keyword_absent_leaves_empty_cell() {
        let store = FakeStore::default();
        let mut crawler = FakeCrawler::with_links("https://x/a", &["https://x/a/d1"]);
        crawler.set_check("https://x/a/d1", false, None);

        reconciler()
            .run_with_label(LABEL_1, &[entry("Acme", "https://x/a")], &crawler, &store)
            .await
            .unwrap();

        let row = store.row_for("Acme", "https://x/a/d1").unwrap();
        assert_eq!(row[3], "");
    }

    #[tokio::test]
    async fn test_check_error_records_marker() {
        let store = FakeStore::default();
        let mut crawler = FakeCrawler::with_links("https://x/a", &["https://x/a/d1"]);
        crawler.set_check("https://x/a/d1", false, Some("timed out"));

        let stats = reconciler()
            .run_with_label(LABEL_1, &[entry("Acme", "https://x/a")], &crawler, &store)
            .await
            .unwrap();

        assert_eq!(stats.errors, 1);
        let row = store.row_for("Acme", "https://x/a/d1").unwrap();
        assert_eq!(row[3], "ERROR: timed out");
    }

    #[tokio::test]
    async fn test_link_failure_degrades_and_run_continues() {
        let store = FakeStore::default();
        let mut crawler = FakeCrawler::with_links("https://x/b", &["https://x/b/d1"]);
        crawler.set_check("https://x/b/d1", true, None);
        crawler.fail_seed("https://x/a");

        let entries = vec![entry("Broken", "https://x/a"), entry("Fine", "https://x/b")];
        let stats = reconciler()
            .run_with_label(LABEL_1, &entries, &crawler, &store)
            .await
            .unwrap();

        // The failing entry got an error marker on its synthetic row
        let row = store.row_for("Broken", "").unwrap();
        assert!(row[3].starts_with("ERROR: "));

        // The healthy entry was still processed
        let row = store.row_for("Fine", "https://x/b/d1").unwrap();
        assert_eq!(row[3], "FOUND");
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.found, 1);
    }

    #[tokio::test]
    async fn test_history_preserved_across_runs() {
        let store = FakeStore::default();
        let mut crawler = FakeCrawler::with_links("https://x/a", &["https://x/a/d1"]);
        crawler.set_check("https://x/a/d1", true, None);
        let entries = vec![entry("Acme", "https://x/a")];
        let engine = reconciler();

        engine
            .run_with_label(LABEL_1, &entries, &crawler, &store)
            .await
            .unwrap();

        // Second run: keyword no longer found
        crawler.set_check("https://x/a/d1", false, None);
        engine
            .run_with_label(LABEL_2, &entries, &crawler, &store)
            .await
            .unwrap();

        assert_eq!(
            store.header(),
            vec!["Name", "Seed URL", "Detail URL", LABEL_1, LABEL_2]
        );
        let row = store.row_for("Acme", "https://x/a/d1").unwrap();
        // Run 1's cell is untouched, run 2's cell is empty
        assert_eq!(row[3], "FOUND");
        assert_eq!(row[4], "");
    }

    #[tokio::test]
    async fn test_same_label_rerun_is_idempotent() {
        let store = FakeStore::default();
        let mut crawler = FakeCrawler::with_links("https://x/a", &["https://x/a/d1"]);
        crawler.set_check("https://x/a/d1", false, None);
        let entries = vec![entry("Acme", "https://x/a")];
        let engine = reconciler();

        engine
            .run_with_label(LABEL_1, &entries, &crawler, &store)
            .await
            .unwrap();

        // Rerun within the same label granularity, now finding the keyword
        crawler.set_check("https://x/a/d1", true, None);
        engine
            .run_with_label(LABEL_1, &entries, &crawler, &store)
            .await
            .unwrap();

        // No duplicate column, no duplicate row; the column was overwritten
        assert_eq!(
            store.header(),
            vec!["Name", "Seed URL", "Detail URL", LABEL_1]
        );
        assert_eq!(store.rows().len(), 1);
        let row = store.row_for("Acme", "https://x/a/d1").unwrap();
        assert_eq!(row[3], "FOUND");
    }

    #[tokio::test]
    async fn test_stale_rows_deleted_others_keep_history() {
        let store = FakeStore::default();
        let mut crawler = FakeCrawler::with_links("https://x/a", &["https://x/a/d1"]);
        crawler.add_links("https://x/b", &["https://x/b/d1"]);
        crawler.set_check("https://x/a/d1", true, None);
        crawler.set_check("https://x/b/d1", true, None);
        let engine = reconciler();

        let both = vec![entry("Keep", "https://x/a"), entry("Drop", "https://x/b")];
        engine
            .run_with_label(LABEL_1, &both, &crawler, &store)
            .await
            .unwrap();
        assert_eq!(store.rows().len(), 2);

        // "Drop" leaves the catalog before run 2
        let only = vec![entry("Keep", "https://x/a")];
        engine
            .run_with_label(LABEL_2, &only, &crawler, &store)
            .await
            .unwrap();

        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "Keep");
        // Surviving row retains both run columns
        assert_eq!(rows[0][3], "FOUND");
        assert_eq!(rows[0][4], "FOUND");
    }

    #[tokio::test]
    async fn test_stale_deletion_issued_descending() {
        let header: Vec<String> = ["Name", "Seed URL", "Detail URL", LABEL_1]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mk = |name: &str, seed: &str| {
            vec![
                name.to_string(),
                seed.to_string(),
                String::new(),
                String::new(),
            ]
        };
        // Positions 2..=6; "B", "D" and "E" are about to go stale
        let store = FakeStore::with_log(
            header,
            vec![
                mk("A", "https://x/a"),
                mk("B", "https://x/b"),
                mk("C", "https://x/c"),
                mk("D", "https://x/d"),
                mk("E", "https://x/e"),
            ],
        );

        let mut crawler = FakeCrawler::default();
        crawler.add_links("https://x/a", &[]);
        crawler.add_links("https://x/c", &[]);
        let entries = vec![entry("A", "https://x/a"), entry("C", "https://x/c")];

        let stats = reconciler()
            .run_with_label(LABEL_2, &entries, &crawler, &store)
            .await
            .unwrap();

        assert_eq!(stats.stale_deleted, 3);
        let batches = store.delete_batches.lock().unwrap().clone();
        assert_eq!(batches, vec![vec![6, 5, 3]]);
    }

    #[tokio::test]
    async fn test_duplicate_catalog_entries_collapse() {
        let store = FakeStore::default();
        let mut crawler = FakeCrawler::with_links("https://x/a", &["https://x/a/d1"]);
        crawler.set_check("https://x/a/d1", true, None);

        let entries = vec![entry("Acme", "https://x/a"), entry("Acme", "https://x/a")];
        let stats = reconciler()
            .run_with_label(LABEL_1, &entries, &crawler, &store)
            .await
            .unwrap();

        // The duplicate was crawled twice but merged into one row
        assert_eq!(stats.links_checked, 2);
        assert_eq!(store.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_rows_padded_to_header_length() {
        // A row created under a three-column header, before any run
        // column existed
        let store = FakeStore::with_log(
            ["Name", "Seed URL", "Detail URL"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            vec![vec![
                "Old".to_string(),
                "https://x/o".to_string(),
                "https://x/o/d1".to_string(),
            ]],
        );

        let mut crawler = FakeCrawler::default();
        crawler.add_links("https://x/o", &[]);
        crawler.add_links("https://x/n", &["https://x/n/d1"]);
        crawler.set_check("https://x/n/d1", true, None);

        let entries = vec![entry("Old", "https://x/o"), entry("New", "https://x/n")];
        reconciler()
            .run_with_label(LABEL_1, &entries, &crawler, &store)
            .await
            .unwrap();

        let header_len = store.header().len();
        for row in store.rows() {
            assert_eq!(row.len(), header_len);
        }
    }

    #[tokio::test]
    async fn test_malformed_short_row_is_stale() {
        let store = FakeStore::with_log(
            ["Name", "Seed URL", "Detail URL"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            vec![vec!["orphan".to_string()]],
        );

        let crawler = FakeCrawler::with_links("https://x/a", &[]);
        let stats = reconciler()
            .run_with_label(LABEL_1, &[entry("Acme", "https://x/a")], &crawler, &store)
            .await
            .unwrap();

        assert_eq!(stats.stale_deleted, 1);
        assert!(store.row_for("orphan", "").is_none());
    }

    #[tokio::test]
    async fn test_empty_catalog_clears_log() {
        let store = FakeStore::with_log(
            ["Name", "Seed URL", "Detail URL", LABEL_1]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            vec![vec![
                "Gone".to_string(),
                "https://x/g".to_string(),
                String::new(),
                "FOUND".to_string(),
            ]],
        );

        let crawler = FakeCrawler::default();
        let stats = reconciler()
            .run_with_label(LABEL_2, &[], &crawler, &store)
            .await
            .unwrap();

        assert_eq!(stats.stale_deleted, 1);
        assert_eq!(stats.rows_written, 0);
        assert!(store.rows().is_empty());
    }
}
