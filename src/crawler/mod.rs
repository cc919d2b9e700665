//! Crawler module for walking the remote catalog
//!
//! This module contains the core crawling logic, including:
//! - Rate-limited remote calls with bounded retries
//! - Paged listings, batch lookups and deduplication
//! - Seed, artist, album and track hydration
//! - Progress events and the looping driver

mod coordinator;
mod driver;
mod events;
mod fetcher;
mod rate_limit;

pub use coordinator::{run_crawl_cycle, Coordinator};
pub use driver::{
    base_sleep, is_idle_cycle, next_sleep, report_cycle, run_loop, run_once, SummaryFormat,
};
pub use events::{CrawlEvent, EventSink};
pub use fetcher::{remote_ids, CatalogFetcher, RemoteId, SearchPage, LISTING_PAGE_SIZE};
pub use rate_limit::{RateLimitedCaller, MAX_BACKOFF};

use crate::config::Config;
use crate::state::RunResult;
use crate::Result;
use tokio_util::sync::CancellationToken;

/// Runs a single crawl cycle
///
/// This is the main entry point for a driver. Each call:
/// 1. Opens the catalog database and memo store named in `config`
/// 2. Walks every genre seed, resuming from persisted progress
/// 3. Retries partially hydrated artists within their budget
/// 4. Reports whether the catalog is complete
pub async fn run_cycle(config: Config, cancel: CancellationToken) -> Result<RunResult> {
    run_crawl_cycle(config, cancel).await
}
