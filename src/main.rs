mod browser;
mod config;
mod error;
mod listing;
mod logging;
mod scraper;
mod utils;

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::listing::ListingScraper;
use crate::logging::{init_logging, parse_log_level, LoggerConfig};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "ranklist-scraper",
    version,
    about = "Scrape an infinite-scroll ranking listing into JSON"
)]
struct Cli {
    /// Path to the TOML config (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level regardless of the configured level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print single-line JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the listing in Chromium, scroll it to the end and extract it
    Scrape {
        /// Listing URL, overriding site.listing_url
        #[arg(long)]
        url: Option<String>,

        /// Save the final DOM under this directory before extracting
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },
    /// Extract records from saved DOM snapshots
    Extract {
        /// Glob pattern of snapshot files, e.g. "snapshots/*.html"
        pattern: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        parse_log_level(&config.logging.level)?
    };
    init_logging(LoggerConfig {
        directory: config.logging.directory.clone(),
        file_name: config.logging.filename.clone(),
        rotation: tracing_appender::rolling::Rotation::DAILY,
        level,
    })?;
    log_info!(
        "[main] Configuration loaded, listing {}",
        config.site.listing_url
    );

    let pretty = config.output.pretty && !cli.compact;
    let command = cli.command.unwrap_or(Command::Scrape {
        url: None,
        snapshot_dir: None,
    });

    let result = match command {
        Command::Scrape { url, snapshot_dir } => scrape(&config, url, snapshot_dir, pretty).await,
        Command::Extract { pattern } => extract(&config, &pattern, pretty),
    };

    if let Err(err) = &result {
        log_error!(*err => "[main] Run failed");
    }
    Ok(result?)
}

async fn scrape(
    config: &Config,
    url: Option<String>,
    snapshot_dir: Option<PathBuf>,
    pretty: bool,
) -> error::Result<()> {
    let url = url.unwrap_or_else(|| config.site.listing_url.clone());
    let scraper = ListingScraper::new(config)?.with_snapshot_dir(snapshot_dir);

    let session = BrowserSession::builder()
        .with_config(&config.browser)
        .launch()
        .await?;

    // Chromium is closed whatever the outcome of the run.
    let outcome = match session.open(&url).await {
        Ok(page) => scraper.run(&page).await,
        Err(e) => Err(e),
    };
    session.close().await?;
    let report = outcome?;

    if let Some(path) = &report.snapshot {
        log_info!("[main] Final DOM saved to {}", path.display());
    }

    log_info!(
        "[main] {} record(s) kept of {} card(s) after {} round(s) ({} never quiet), stopped on {:?}",
        report.records.len(),
        report.extracted,
        report.rounds,
        report.network_timeouts,
        report.stop_reason
    );
    utils::write_json(&report.records, pretty)
}

/// Prints one array for a single snapshot, otherwise an object keyed by
/// path in snapshot order.
fn extract(config: &Config, pattern: &str, pretty: bool) -> error::Result<()> {
    let scraper = ListingScraper::new(config)?;
    let snapshots = utils::read_snapshots(pattern)?;

    let mut by_path = Vec::with_capacity(snapshots.len());
    for (path, html) in snapshots {
        let (records, extracted) = scraper.extract(&html);
        log_info!(
            "[main] {}: {} record(s) kept of {} card(s)",
            path.display(),
            records.len(),
            extracted
        );
        by_path.push((path.display().to_string(), records));
    }

    if by_path.len() == 1 {
        let (_, records) = by_path.remove(0);
        return utils::write_json(&records, pretty);
    }
    utils::write_json(&utils::ByPath(by_path), pretty)
}
