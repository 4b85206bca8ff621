//! listwatch CLI
//!
//! Local execution entry point. One `run` equals one reconciliation
//! pass; scheduling repeated runs is left to cron or similar.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use listwatch::{
    error::Result,
    models::{Config, LogHeader},
    pipeline::Reconciler,
    services::{self, HttpCrawler},
    storage::{LocalStore, LogStore},
};

/// listwatch - keyword watch log for listing detail pages
#[derive(Parser, Debug)]
#[command(
    name = "listwatch",
    version,
    about = "Tracks keyword presence on listing detail pages as a row/column watch log"
)]
struct Cli {
    /// Path to storage directory containing config, catalog and log
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one reconciliation pass: crawl the catalog and append a
    /// result column to the log
    Run,

    /// Validate configuration files
    Validate,

    /// Show current log info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("listwatch starting...");

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    let store = LocalStore::new(&cli.storage_dir);

    match cli.command {
        Command::Run => {
            let grid = store.load_catalog_grid().await?;
            let entries = services::parse_catalog(&grid, &config.catalog);
            log::info!(
                "Loaded {} catalog entries ({} grid rows)",
                entries.len(),
                grid.len()
            );

            if entries.is_empty() {
                log::warn!("Catalog is empty; the run will only prune stale rows.");
            }

            let crawler = HttpCrawler::new(&config.crawler, &config.extract)?;
            let engine = Reconciler::from_config(&config);
            let stats = engine.run(&entries, &crawler, &store).await?;

            log::info!(
                "Run '{}': {} rows, {} links checked, {} found, {} errors, {} stale deleted",
                stats.label,
                stats.rows_written,
                stats.links_checked,
                stats.found,
                stats.errors,
                stats.stale_deleted
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());

            let sheet = store.read().await?;
            if sheet.header.is_empty() && sheet.rows.is_empty() {
                log::info!("No log written yet.");
            } else {
                let header = LogHeader::from_labels(sheet.header);
                log::info!(
                    "Log: {} rows x {} columns",
                    sheet.rows.len(),
                    header.len()
                );
                match header.last_run_label() {
                    Some(label) => log::info!("Last run: {}", label),
                    None => log::info!("No run columns recorded yet."),
                }
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
