//! catalog-crawler main entry point
//!
//! This is the command-line interface for the genre-seeded catalog crawler.

use anyhow::Context;
use catalog_crawler::config::{load_config_with_hash, Config};
use catalog_crawler::crawler::{run_loop, run_once, Coordinator, CrawlEvent, EventSink, SummaryFormat};
use catalog_crawler::output::{load_statistics, print_statistics};
use catalog_crawler::storage::open_storage;
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// catalog-crawler: a resumable music catalog crawler
///
/// Discovers artists by genre seed and hydrates their albums and tracks
/// into a local SQLite catalog, picking up where the last run stopped.
#[derive(Parser, Debug)]
#[command(name = "catalog-crawler")]
#[command(version)]
#[command(about = "A resumable genre-seeded music catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Keep running cycles until the catalog is complete
    #[arg(long = "loop", conflicts_with_all = ["dry_run", "stats"])]
    run_loop: bool,

    /// Clear the crawl progress namespace before starting
    #[arg(long)]
    reset_memo: bool,

    /// Print each cycle summary as a JSON line on stdout
    #[arg(long)]
    json_logs: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show catalog statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        Ok(())
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, config_hash, &cli).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_crawler=info,warn"),
            1 => EnvFilter::new("catalog_crawler=debug,info"),
            2 => EnvFilter::new("catalog_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== catalog-crawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Retry backoff: {}ms", config.crawler.retry_backoff_ms);
    println!("  Max artist retries: {}", config.crawler.max_artist_retries);
    println!("  Search page size: {}", config.crawler.search_page_size);

    println!("\nRemote API:");
    println!("  Base URL: {}", config.api.base_url);
    println!(
        "  Access token: {}",
        if config.api.access_token.is_some() {
            "configured"
        } else {
            "missing"
        }
    );

    println!("\nCrawl Progress:");
    println!(
        "  Store: {}",
        config
            .memo
            .connection
            .as_deref()
            .unwrap_or("process-local (not persisted)")
    );
    println!("  Namespace: {}", config.memo.namespace);
    println!("  TTL: {}s", config.memo.ttl_seconds);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nGenre Seeds ({}):", config.genres.seeds.len());
    for seed in &config.genres.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open catalog database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, cli: &Cli) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let (events, receiver) = EventSink::channel();
    tokio::spawn(log_events(receiver));

    let driver_config = config.driver.clone();
    tracing::info!("Genre seeds: {}", config.genres.seeds.len());

    let mut coordinator = Coordinator::from_config(config, cancel.clone())
        .context("Failed to initialise crawler")?
        .with_events(events)
        .with_config_hash(config_hash);

    if cli.reset_memo {
        let cleared = coordinator.memo().reset();
        tracing::info!("Cleared {} crawl progress keys", cleared);
    }

    let format = if cli.json_logs {
        SummaryFormat::Json
    } else {
        SummaryFormat::Text
    };

    let result = if cli.run_loop {
        run_loop(&mut coordinator, &driver_config, cancel, format).await
    } else {
        run_once(&mut coordinator, format).await
    };

    match result {
        Ok(result) => {
            if result.completed {
                tracing::info!("Crawl complete");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Shutdown requested; finishing current step");
            cancel.cancel();
        }
    });
}

async fn log_events(mut receiver: tokio::sync::mpsc::UnboundedReceiver<CrawlEvent>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            CrawlEvent::SeedStart {
                seed,
                index,
                total,
                offset,
            } => tracing::debug!("[{}/{}] genre \"{}\" from offset {}", index, total, seed, offset),
            CrawlEvent::SeedDone { seed, hydrated } => {
                tracing::debug!("genre \"{}\" finished (hydrated: {})", seed, hydrated)
            }
            _ => tracing::trace!("{:?}", event),
        }
    }
}
