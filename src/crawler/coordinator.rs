//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl cycle that walks the catalog hierarchy:
//! - Pages through each genre seed's artist search, resuming from the
//!   persisted offset
//! - Deduplicates artists across seeds within a cycle
//! - Hydrates artists, their albums and the albums' tracks bottom-up
//! - Tracks partial and failed artists with a bounded retry budget
//! - Decides whether the whole catalog is complete
//!
//! All progress lives in the [`MemoStore`], so a cycle interrupted at any
//! point is picked up by the next one.

use crate::api::{AlbumPayload, ApiError, ArtistPayload, CatalogApi, SpotifyApi, TrackPayload};
use crate::config::Config;
use crate::crawler::events::{CrawlEvent, EventSink};
use crate::crawler::fetcher::{remote_ids, CatalogFetcher};
use crate::crawler::rate_limit::RateLimitedCaller;
use crate::memo::{keys, MemoStore};
use crate::state::{CompletionReason, EntityStatus, RunResult};
use crate::storage::{CatalogStore, SqliteCatalogStore};
use crate::{CrawlError, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Fully qualified memo keys for one namespace
struct MemoKeys {
    seed_done: String,
    hydrated_seeds: String,
    seed_offsets: String,
    hydrated_artists: String,
    hydrated_albums: String,
    partial_artists: String,
    failed_artists: String,
    artist_retries: String,
    meta: String,
}

impl MemoKeys {
    fn new(memo: &MemoStore) -> Self {
        Self {
            seed_done: memo.key(keys::SEED_DONE),
            hydrated_seeds: memo.key(keys::HYDRATED_SEEDS),
            seed_offsets: memo.key(keys::SEED_OFFSETS),
            hydrated_artists: memo.key(keys::HYDRATED_ARTISTS),
            hydrated_albums: memo.key(keys::HYDRATED_ALBUMS),
            partial_artists: memo.key(keys::PARTIAL_ARTISTS),
            failed_artists: memo.key(keys::FAILED_ARTISTS),
            artist_retries: memo.key(keys::ARTIST_RETRIES),
            meta: memo.key(keys::META),
        }
    }
}

/// Per-cycle scratch state
struct Cycle {
    result: RunResult,
    seen_artist_ids: HashSet<String>,
}

impl Cycle {
    fn new() -> Self {
        Self {
            result: RunResult::new(),
            seen_artist_ids: HashSet::new(),
        }
    }

    fn cancel(&mut self) {
        self.result.cancelled = true;
    }

    fn is_cancelled(&self) -> bool {
        self.result.cancelled
    }
}

struct ArtistOutcome {
    status: EntityStatus,
    hydrated: bool,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: Box<dyn CatalogStore>,
    fetcher: CatalogFetcher,
    memo: MemoStore,
    keys: MemoKeys,
    events: EventSink,
    cancel: CancellationToken,
    config_hash: Option<String>,
}

impl Coordinator {
    /// Creates a coordinator from explicit collaborators
    pub fn new(
        config: Config,
        api: Arc<dyn CatalogApi>,
        storage: Box<dyn CatalogStore>,
        memo: MemoStore,
        cancel: CancellationToken,
    ) -> Self {
        let limiter = RateLimitedCaller::from_config(&config.crawler, cancel.clone());
        let keys = MemoKeys::new(&memo);

        Self {
            config: Arc::new(config),
            storage,
            fetcher: CatalogFetcher::new(api, limiter),
            memo,
            keys,
            events: EventSink::disabled(),
            cancel,
            config_hash: None,
        }
    }

    /// Creates a coordinator wired to the real API, catalog database and
    /// memo store named in `config`
    pub fn from_config(config: Config, cancel: CancellationToken) -> Result<Self> {
        let api = SpotifyApi::new(&config.api)?;
        if config.api.access_token.is_none() {
            tracing::warn!("No API access token configured; requests will likely be rejected");
        }
        let storage = SqliteCatalogStore::new(Path::new(&config.output.database_path))?;
        let memo = MemoStore::from_config(&config.memo, config.crawler.max_artist_retries);

        Ok(Self::new(
            config,
            Arc::new(api),
            Box::new(storage),
            memo,
            cancel,
        ))
    }

    /// Sends progress events to `events`
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Records `hash` as the configuration this namespace is crawled with
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn memo(&mut self) -> &mut MemoStore {
        &mut self.memo
    }

    pub fn storage(&self) -> &dyn CatalogStore {
        self.storage.as_ref()
    }

    /// Runs one full crawl cycle over every configured genre seed
    ///
    /// Safe to call repeatedly; each call continues from persisted progress.
    /// Failures of individual artists are contained and reported through
    /// the returned [`RunResult`]. Once every seed is searched and every
    /// discovered artist hydrated, the memo namespace is cleared.
    ///
    /// # Returns
    ///
    /// * `Ok(RunResult)` - Counters, failed ids and the completion reason;
    ///   `cancelled` is set when a shutdown cut the cycle short
    /// * `Err(CrawlError)` - The catalog database could not be read while
    ///   bootstrapping progress
    ///
    /// # Example
    ///
    /// ```no_run
    /// use catalog_crawler::config::load_config;
    /// use catalog_crawler::crawler::Coordinator;
    /// use std::path::Path;
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = load_config(Path::new("crawler.toml"))?;
    /// let mut coordinator = Coordinator::from_config(config, CancellationToken::new())?;
    /// let result = coordinator.run_cycle().await?;
    /// println!("complete: {}", result.completed);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_cycle(&mut self) -> Result<RunResult> {
        let mut cycle = Cycle::new();
        let seeds = self.config.genres.seeds.clone();

        tracing::info!("Starting crawl cycle over {} genre seeds", seeds.len());

        self.bootstrap_from_storage()?;
        self.check_config_hash();

        for (index, seed) in seeds.iter().enumerate() {
            if self.cancel.is_cancelled() {
                cycle.cancel();
                break;
            }
            self.crawl_seed(&mut cycle, seed, index + 1, seeds.len())
                .await;
        }

        if !cycle.is_cancelled() {
            self.sweep_partial_artists(&mut cycle).await;
        }

        let reason = self.completion_reason(&seeds);
        cycle.result.finish(reason);

        if reason.is_complete() {
            let cleared = self.memo.reset();
            tracing::info!(
                "Catalog crawl complete ({}); cleared {} memo keys",
                reason,
                cleared
            );
        }

        let result = cycle.result;
        tracing::info!(
            "Cycle finished: artists created={} updated={} skipped={} hydrated_skipped={}, \
             albums created={} updated={} skipped={}, tracks created={} skipped={} failed={}, \
             failed_artists={}, reason={}",
            result.artists_created,
            result.artists_updated,
            result.artists_skipped,
            result.artists_fully_hydrated_skipped,
            result.albums_created,
            result.albums_updated,
            result.albums_skipped,
            result.tracks_created,
            result.tracks_skipped,
            result.tracks_failed,
            result.failed_artist_ids.len(),
            reason
        );

        Ok(result)
    }

    /// Loads hydrated albums and artists from the catalog database the first
    /// time a namespace is used
    fn bootstrap_from_storage(&mut self) -> Result<()> {
        if self
            .memo
            .hash_get(&self.keys.meta, keys::META_SEEDED_FROM_DB)
            .as_deref()
            == Some("1")
        {
            return Ok(());
        }

        let album_ids = self.storage.hydrated_album_ids()?;
        let artist_ids = self.storage.hydrated_artist_ids()?;

        for album_id in &album_ids {
            self.memo.add(&self.keys.hydrated_albums, album_id);
        }
        for artist_id in &artist_ids {
            self.memo.add(&self.keys.hydrated_artists, artist_id);
        }
        self.memo
            .hash_set(&self.keys.meta, keys::META_SEEDED_FROM_DB, "1");

        tracing::info!(
            "Seeded crawl progress from catalog database: {} hydrated albums, {} hydrated artists",
            album_ids.len(),
            artist_ids.len()
        );
        Ok(())
    }

    fn check_config_hash(&mut self) {
        let Some(hash) = self.config_hash.clone() else {
            return;
        };
        if let Some(previous) = self.memo.hash_get(&self.keys.meta, keys::META_CONFIG_HASH) {
            if previous != hash {
                tracing::warn!(
                    "Configuration changed since this crawl namespace was started; \
                     consider --reset-memo"
                );
            }
        }
        self.memo
            .hash_set(&self.keys.meta, keys::META_CONFIG_HASH, &hash);
    }

    // ===== Seeds =====

    async fn crawl_seed(&mut self, cycle: &mut Cycle, seed: &str, index: usize, total: usize) {
        if self.memo.is_member(&self.keys.seed_done, seed) {
            tracing::debug!(
                "Genre seed {}/{} \"{}\" already searched; skipping",
                index,
                total,
                seed
            );
            return;
        }

        let page_size = self.config.crawler.search_page_size;
        let mut offset = self.memo.hash_get_u32(&self.keys.seed_offsets, seed);

        self.events.emit(CrawlEvent::SeedStart {
            seed: seed.to_string(),
            index,
            total,
            offset,
        });
        tracing::debug!(
            "Searching genre seed {}/{} \"{}\" from offset {}",
            index,
            total,
            seed,
            offset
        );

        loop {
            if self.cancel.is_cancelled() {
                cycle.cancel();
                break;
            }

            let page = match self.fetcher.search_by_genre(seed, offset, page_size).await {
                Ok(page) => page,
                Err(ApiError::Cancelled) => {
                    cycle.cancel();
                    break;
                }
                Err(e) => {
                    tracing::error!("Search failed for genre seed \"{}\": {}", seed, e);
                    break;
                }
            };

            if page.fetched == 0 {
                self.memo.add(&self.keys.seed_done, seed);
                break;
            }

            if let Some(total_artists) = page.total {
                self.events.emit(CrawlEvent::SeedTotal {
                    seed: seed.to_string(),
                    total_artists,
                    offset,
                });
            }

            for artist in &page.artists {
                if self.cancel.is_cancelled() {
                    cycle.cancel();
                    break;
                }
                self.crawl_seed_artist(cycle, seed, artist).await;
                if cycle.is_cancelled() {
                    break;
                }
            }

            // An interrupted page is replayed from the same offset next time
            if cycle.is_cancelled() {
                break;
            }

            // Judged on the raw count so repeated ids never end a seed early
            if page.fetched < page_size as usize {
                self.memo.add(&self.keys.seed_done, seed);
                break;
            }

            offset += page_size;
            self.memo
                .hash_set(&self.keys.seed_offsets, seed, &offset.to_string());
        }

        let seed_artists = self.memo.sub_key(keys::SEED_ARTISTS, seed);
        let hydrated = self.memo.is_member(&self.keys.seed_done, seed)
            && self
                .memo
                .diff_is_empty(&seed_artists, &self.keys.hydrated_artists);
        if hydrated {
            self.memo.add(&self.keys.hydrated_seeds, seed);
        }

        self.events.emit(CrawlEvent::SeedDone {
            seed: seed.to_string(),
            hydrated,
        });
    }

    async fn crawl_seed_artist(&mut self, cycle: &mut Cycle, seed: &str, artist: &ArtistPayload) {
        let artist_id = artist.id.as_str();

        self.events.emit(CrawlEvent::ArtistStart {
            artist_id: artist_id.to_string(),
            name: artist.name.clone(),
        });

        let seed_artists = self.memo.sub_key(keys::SEED_ARTISTS, seed);
        self.memo.add(&seed_artists, artist_id);

        if !cycle.seen_artist_ids.insert(artist_id.to_string()) {
            cycle.result.record_artist(EntityStatus::Skipped);
            self.emit_artist_result(artist_id, EntityStatus::Skipped);
            return;
        }

        if self.memo.is_member(&self.keys.hydrated_artists, artist_id) {
            cycle.result.artists_fully_hydrated_skipped += 1;
            self.emit_artist_result(artist_id, EntityStatus::Skipped);
            return;
        }

        if self.retries_exhausted(artist_id) {
            tracing::debug!(
                "Artist {} ({}) exhausted its retry budget; skipping",
                artist.name,
                artist_id
            );
            self.memo.add(&self.keys.failed_artists, artist_id);
            self.emit_artist_result(artist_id, EntityStatus::Failed);
            return;
        }

        self.attempt_artist(cycle, artist).await;
    }

    // ===== Partial artists =====

    async fn sweep_partial_artists(&mut self, cycle: &mut Cycle) {
        let mut partial: Vec<String> = self
            .memo
            .members(&self.keys.partial_artists)
            .into_iter()
            .collect();
        partial.sort();

        if !partial.is_empty() {
            tracing::info!("Retrying {} partially hydrated artists", partial.len());
        }

        for artist_id in partial {
            if self.cancel.is_cancelled() {
                cycle.cancel();
                break;
            }

            if self.memo.is_member(&self.keys.hydrated_artists, &artist_id) {
                self.memo.remove(&self.keys.partial_artists, &artist_id);
                continue;
            }

            if self.retries_exhausted(&artist_id) {
                self.memo.add(&self.keys.failed_artists, &artist_id);
                continue;
            }

            let artist = match self.fetcher.fetch_artist(&artist_id).await {
                Ok(artist) => artist,
                Err(ApiError::Cancelled) => {
                    cycle.cancel();
                    break;
                }
                Err(e) => {
                    tracing::warn!("Failed to refetch artist {}: {}", artist_id, e);
                    self.note_artist_failure(&artist_id);
                    continue;
                }
            };

            self.attempt_artist(cycle, &artist).await;
            if cycle.is_cancelled() {
                break;
            }
        }
    }

    fn retries_exhausted(&mut self, artist_id: &str) -> bool {
        let retries = self
            .memo
            .hash_get_u32(&self.keys.artist_retries, artist_id);
        retries >= self.memo.max_artist_retries()
    }

    fn note_artist_failure(&mut self, artist_id: &str) {
        self.memo.add(&self.keys.partial_artists, artist_id);
        self.memo
            .hash_incr(&self.keys.artist_retries, artist_id, 1);
    }

    fn emit_artist_result(&self, artist_id: &str, status: EntityStatus) {
        self.events.emit(CrawlEvent::ArtistResult {
            artist_id: artist_id.to_string(),
            status,
        });
    }

    // ===== Hydration =====

    /// Hydrates one artist and updates its progress state
    ///
    /// Returns true if the artist ended up hydrated.
    async fn attempt_artist(&mut self, cycle: &mut Cycle, artist: &ArtistPayload) -> bool {
        let artist_id = artist.id.as_str();

        match self.hydrate_artist(cycle, artist).await {
            Ok(outcome) if outcome.hydrated => {
                self.memo.add(&self.keys.hydrated_artists, artist_id);
                self.memo.remove(&self.keys.partial_artists, artist_id);
                self.memo.remove(&self.keys.failed_artists, artist_id);
                self.emit_artist_result(artist_id, outcome.status);
                true
            }
            Ok(_) => {
                tracing::debug!(
                    "Artist {} ({}) is only partially hydrated",
                    artist.name,
                    artist_id
                );
                self.note_artist_failure(artist_id);
                self.emit_artist_result(artist_id, EntityStatus::Failed);
                false
            }
            Err(e) if e.is_cancelled() => {
                cycle.cancel();
                false
            }
            Err(e) => {
                tracing::error!(
                    "Failed crawling artist {} ({}): {}",
                    artist.name,
                    artist_id,
                    e
                );
                cycle.result.record_failed_artist(artist_id);
                self.note_artist_failure(artist_id);
                self.emit_artist_result(artist_id, EntityStatus::Failed);
                false
            }
        }
    }

    async fn hydrate_artist(
        &mut self,
        cycle: &mut Cycle,
        artist: &ArtistPayload,
    ) -> Result<ArtistOutcome> {
        let stored = self.storage.upsert_artist(artist)?;
        let status = EntityStatus::from_created(stored.created);
        cycle.result.record_artist(status);
        if stored.created {
            tracing::info!("Artist created: {}", artist.name);
        }

        let listing = self.fetcher.list_artist_albums(&artist.id).await?;
        if let Some(total_albums) = listing.total {
            self.events.emit(CrawlEvent::ArtistAlbumTotal {
                artist_id: artist.id.clone(),
                total_albums,
            });
        }

        let albums = self
            .fetcher
            .batch_fetch_albums(&remote_ids(&listing.items))
            .await?;
        if albums.is_empty() {
            tracing::debug!("Artist {} ({}) has no albums", artist.name, artist.id);
            return Ok(ArtistOutcome {
                status,
                hydrated: false,
            });
        }

        let mut hydrated = true;
        for album in &albums {
            if self.cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }
            if !self
                .hydrate_album(cycle, album, stored.id, &artist.name)
                .await?
            {
                hydrated = false;
            }
        }

        Ok(ArtistOutcome { status, hydrated })
    }

    /// Hydrates one album, returning true once its tracks are all stored
    async fn hydrate_album(
        &mut self,
        cycle: &mut Cycle,
        album: &AlbumPayload,
        artist_row_id: i64,
        artist_name: &str,
    ) -> Result<bool> {
        self.events.emit(CrawlEvent::AlbumStart {
            album_id: album.id.clone(),
            name: album.name.clone(),
        });

        if self.memo.is_member(&self.keys.hydrated_albums, &album.id) {
            self.record_album(cycle, &album.id, EntityStatus::Skipped);
            return Ok(true);
        }

        if let Some(existing) = self.storage.find_album(&album.id)? {
            let track_count = self.storage.album_track_count(existing.id)?;
            if existing.total_tracks > 0 && track_count >= existing.total_tracks {
                tracing::debug!(
                    "Album \"{}\" already hydrated ({}/{} tracks); skipping",
                    album.name,
                    track_count,
                    existing.total_tracks
                );
                self.memo.add(&self.keys.hydrated_albums, &album.id);
                self.record_album(cycle, &album.id, EntityStatus::Skipped);
                return Ok(true);
            }
        }

        let stored = self.storage.upsert_album(album, artist_row_id)?;
        let status = EntityStatus::from_created(stored.created);
        self.record_album(cycle, &album.id, status);
        if stored.created {
            tracing::info!("Album created: {} / {}", artist_name, album.name);
        }

        let listing = self.fetcher.list_album_tracks(&album.id).await?;
        if let Some(total_tracks) = listing.total {
            self.events.emit(CrawlEvent::AlbumTrackTotal {
                album_id: album.id.clone(),
                total_tracks,
            });
        }

        let tracks = self
            .fetcher
            .batch_fetch_tracks(&remote_ids(&listing.items))
            .await?;
        let observed: HashSet<u32> = tracks.iter().filter_map(|t| t.track_number).collect();

        for track in &tracks {
            self.store_track(cycle, track, stored.id, artist_name, &album.name)?;
        }

        // Compared against the numbers actually returned, not the declared total
        let stored_count = self.storage.album_track_count(stored.id)?;
        let hydrated = !observed.is_empty() && stored_count as usize >= observed.len();
        if hydrated {
            self.memo.add(&self.keys.hydrated_albums, &album.id);
        } else {
            tracing::debug!(
                "Album \"{}\" incomplete: {} of {} track numbers stored",
                album.name,
                stored_count,
                observed.len()
            );
        }

        Ok(hydrated)
    }

    fn record_album(&self, cycle: &mut Cycle, album_id: &str, status: EntityStatus) {
        cycle.result.record_album(status);
        self.events.emit(CrawlEvent::AlbumResult {
            album_id: album_id.to_string(),
            status,
        });
    }

    fn store_track(
        &mut self,
        cycle: &mut Cycle,
        track: &TrackPayload,
        album_row_id: i64,
        artist_name: &str,
        album_name: &str,
    ) -> Result<()> {
        let status = if self.storage.track_exists(&track.id)? {
            cycle.result.record_track(EntityStatus::Skipped);
            EntityStatus::Skipped
        } else {
            match self.storage.upsert_track(track, album_row_id) {
                Ok(stored) => {
                    let status = EntityStatus::from_created(stored.created);
                    cycle.result.record_track(status);
                    if stored.created {
                        tracing::info!(
                            "Track created: {} / {} / {}",
                            artist_name,
                            album_name,
                            track.name
                        );
                    }
                    status
                }
                Err(e) if e.is_constraint_violation() => {
                    tracing::warn!(
                        "Skipping track {} ({}) on {} / {}: duplicate track number",
                        track.name,
                        track.id,
                        artist_name,
                        album_name
                    );
                    cycle.result.record_failed_track(&track.id);
                    EntityStatus::Failed
                }
                Err(e) => return Err(e.into()),
            }
        };

        self.events.emit(CrawlEvent::TrackResult {
            track_id: track.id.clone(),
            status,
        });
        Ok(())
    }

    // ===== Completion =====

    /// Every seed searched to exhaustion, then every seed's artists hydrated
    fn completion_reason(&mut self, seeds: &[String]) -> CompletionReason {
        if seeds
            .iter()
            .any(|seed| !self.memo.is_member(&self.keys.seed_done, seed))
        {
            return CompletionReason::SeedDiscoveryIncomplete;
        }

        for seed in seeds {
            let seed_artists = self.memo.sub_key(keys::SEED_ARTISTS, seed);
            if !self
                .memo
                .diff_is_empty(&seed_artists, &self.keys.hydrated_artists)
            {
                return CompletionReason::ArtistsNotHydrated;
            }
        }

        CompletionReason::AllGenresHydrated
    }
}

/// Runs a single crawl cycle with collaborators built from `config`
pub async fn run_crawl_cycle(config: Config, cancel: CancellationToken) -> Result<RunResult> {
    let mut coordinator = Coordinator::from_config(config, cancel)?;
    coordinator.run_cycle().await
}
