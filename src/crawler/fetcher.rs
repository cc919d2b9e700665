//! Catalog fetching
//!
//! Thin wrappers over [`CatalogApi`] that route every remote call through the
//! [`RateLimitedCaller`], page listings until they run dry, drop duplicate ids
//! within a single listing, and chunk batch lookups to the sizes the remote
//! accepts.

use crate::api::{
    AlbumPayload, ApiResult, ArtistPayload, BatchKind, CatalogApi, Page, TrackPayload,
};
use crate::crawler::rate_limit::RateLimitedCaller;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

/// Page size for album and track listings
pub const LISTING_PAGE_SIZE: u32 = 50;

/// Payloads that carry a remote id
pub trait RemoteId {
    fn remote_id(&self) -> &str;
}

impl RemoteId for ArtistPayload {
    fn remote_id(&self) -> &str {
        &self.id
    }
}

impl RemoteId for AlbumPayload {
    fn remote_id(&self) -> &str {
        &self.id
    }
}

impl RemoteId for TrackPayload {
    fn remote_id(&self) -> &str {
        &self.id
    }
}

/// Collects the non-empty ids of a listing, in order
pub fn remote_ids<T: RemoteId>(items: &[T]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.remote_id())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// One page of genre search results
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    /// Artists on the page, first occurrence of each id only
    pub artists: Vec<ArtistPayload>,
    /// Declared total across all pages
    pub total: Option<u32>,
    /// Items returned by the remote before deduplication
    pub fetched: usize,
}

/// Rate-limited access to the remote catalog
pub struct CatalogFetcher {
    api: Arc<dyn CatalogApi>,
    limiter: RateLimitedCaller,
}

impl CatalogFetcher {
    pub fn new(api: Arc<dyn CatalogApi>, limiter: RateLimitedCaller) -> Self {
        Self { api, limiter }
    }

    /// Fetches one page of a genre search
    ///
    /// Offsets are managed by the caller so the position can be persisted.
    /// Repeated artists are dropped from `artists`, while `fetched` keeps
    /// the number of items the remote actually returned.
    pub async fn search_by_genre(
        &mut self,
        seed: &str,
        offset: u32,
        limit: u32,
    ) -> ApiResult<SearchPage> {
        let api = self.api.as_ref();
        let page = self
            .limiter
            .call(move || api.search_artists_by_genre(seed, offset, limit))
            .await?;
        let fetched = page.items.len();
        Ok(SearchPage {
            artists: dedup_by_id(page.items, &mut HashSet::new()),
            total: page.total,
            fetched,
        })
    }

    /// Lists every album of an artist
    pub async fn list_artist_albums(&mut self, artist_id: &str) -> ApiResult<Page<AlbumPayload>> {
        let api = self.api.as_ref();
        collect_pages(&mut self.limiter, move |offset| {
            api.artist_albums(artist_id, offset, LISTING_PAGE_SIZE)
        })
        .await
    }

    /// Lists every track of an album
    pub async fn list_album_tracks(&mut self, album_id: &str) -> ApiResult<Page<TrackPayload>> {
        let api = self.api.as_ref();
        collect_pages(&mut self.limiter, move |offset| {
            api.album_tracks(album_id, offset, LISTING_PAGE_SIZE)
        })
        .await
    }

    /// Fetches full album payloads for the given ids
    pub async fn batch_fetch_albums(&mut self, ids: &[String]) -> ApiResult<Vec<AlbumPayload>> {
        let api = self.api.as_ref();
        fetch_in_chunks(&mut self.limiter, ids, BatchKind::Albums, move |chunk| {
            api.albums(chunk)
        })
        .await
    }

    /// Fetches full track payloads for the given ids
    pub async fn batch_fetch_tracks(&mut self, ids: &[String]) -> ApiResult<Vec<TrackPayload>> {
        let api = self.api.as_ref();
        fetch_in_chunks(&mut self.limiter, ids, BatchKind::Tracks, move |chunk| {
            api.tracks(chunk)
        })
        .await
    }

    /// Fetches one artist by id
    pub async fn fetch_artist(&mut self, artist_id: &str) -> ApiResult<ArtistPayload> {
        let api = self.api.as_ref();
        self.limiter.call(move || api.artist(artist_id)).await
    }
}

fn dedup_by_id<T: RemoteId>(items: Vec<T>, seen: &mut HashSet<String>) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| {
            let id = item.remote_id();
            !id.is_empty() && seen.insert(id.to_string())
        })
        .collect()
}

/// Pages through a listing until a short page, keeping the first declared total
async fn collect_pages<T, F, Fut>(
    limiter: &mut RateLimitedCaller,
    mut fetch_page: F,
) -> ApiResult<Page<T>>
where
    T: RemoteId,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ApiResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    let mut total = None;
    let mut offset = 0;

    loop {
        let page = limiter.call(|| fetch_page(offset)).await?;
        if total.is_none() {
            total = page.total;
        }

        let page_len = page.items.len();
        items.extend(dedup_by_id(page.items, &mut seen));

        if page_len < LISTING_PAGE_SIZE as usize {
            break;
        }
        offset += LISTING_PAGE_SIZE;
    }

    Ok(Page::new(items, total))
}

async fn fetch_in_chunks<'a, T, F, Fut>(
    limiter: &mut RateLimitedCaller,
    ids: &'a [String],
    kind: BatchKind,
    fetch: F,
) -> ApiResult<Vec<T>>
where
    F: Fn(&'a [String]) -> Fut,
    Fut: Future<Output = ApiResult<Vec<T>>>,
{
    let mut items = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(kind.chunk_size()) {
        items.extend(limiter.call(|| fetch(chunk)).await?);
    }
    Ok(items)
}
