//! Storage traits and error types
//!
//! The crawler talks to the catalog database only through [`CatalogStore`],
//! which upserts entities keyed by their remote id and answers the few
//! hydration questions the crawl needs.

use crate::api::{AlbumPayload, ArtistPayload, TrackPayload};
use crate::storage::{AlbumRecord, UpsertOutcome};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A uniqueness constraint rejected the write
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for catalog storage backends
pub trait CatalogStore: Send {
    // ===== Upserts =====

    /// Inserts or refreshes an artist and its genres
    fn upsert_artist(&mut self, artist: &ArtistPayload) -> StorageResult<UpsertOutcome>;

    /// Inserts or refreshes an album under the given artist row
    fn upsert_album(
        &mut self,
        album: &AlbumPayload,
        artist_row_id: i64,
    ) -> StorageResult<UpsertOutcome>;

    /// Inserts or refreshes a track under the given album row
    ///
    /// Returns [`StorageError::ConstraintViolation`] when another track of
    /// the album already holds the same track number.
    fn upsert_track(
        &mut self,
        track: &TrackPayload,
        album_row_id: i64,
    ) -> StorageResult<UpsertOutcome>;

    // ===== Lookups =====

    fn find_album(&self, spotify_id: &str) -> StorageResult<Option<AlbumRecord>>;

    /// Number of distinct track numbers stored for an album
    fn album_track_count(&self, album_row_id: i64) -> StorageResult<u32>;

    fn track_exists(&self, spotify_id: &str) -> StorageResult<bool>;

    /// Remote ids of albums whose stored tracks cover their declared total
    fn hydrated_album_ids(&self) -> StorageResult<Vec<String>>;

    /// Remote ids of artists with at least one album, all of them hydrated
    fn hydrated_artist_ids(&self) -> StorageResult<Vec<String>>;

    // ===== Statistics =====

    fn count_artists(&self) -> StorageResult<u64>;

    fn count_albums(&self) -> StorageResult<u64>;

    fn count_tracks(&self) -> StorageResult<u64>;

    /// Albums whose stored tracks fall short of their declared total
    fn count_unhydrated_albums(&self) -> StorageResult<u64>;

    /// Artists with no albums, or with at least one unhydrated album
    fn count_unhydrated_artists(&self) -> StorageResult<u64>;
}
