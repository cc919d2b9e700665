//! Remote catalog API trait

use crate::api::{AlbumPayload, ApiResult, ArtistPayload, Page, TrackPayload};
use async_trait::async_trait;

/// Trait for remote catalog backends
///
/// Every method issues exactly one remote call. Pagination across pages,
/// deduplication and rate limiting live in the crawler, so implementations
/// (including test doubles) stay thin.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Searches artists tagged with a genre, one page at a time
    async fn search_artists_by_genre(
        &self,
        genre: &str,
        offset: u32,
        limit: u32,
    ) -> ApiResult<Page<ArtistPayload>>;

    /// Lists one page of an artist's albums
    async fn artist_albums(
        &self,
        artist_id: &str,
        offset: u32,
        limit: u32,
    ) -> ApiResult<Page<AlbumPayload>>;

    /// Lists one page of an album's tracks
    async fn album_tracks(
        &self,
        album_id: &str,
        offset: u32,
        limit: u32,
    ) -> ApiResult<Page<TrackPayload>>;

    /// Fetches full album payloads for up to 20 ids
    async fn albums(&self, ids: &[String]) -> ApiResult<Vec<AlbumPayload>>;

    /// Fetches full track payloads for up to 50 ids
    async fn tracks(&self, ids: &[String]) -> ApiResult<Vec<TrackPayload>>;

    /// Fetches a single artist by id
    async fn artist(&self, artist_id: &str) -> ApiResult<ArtistPayload>;
}
