//! Storage module for persisting catalog data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Upserting artists, albums and tracks keyed by remote id
//! - Answering hydration questions used to bootstrap crawl progress

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteCatalogStore;
pub use traits::{CatalogStore, StorageError, StorageResult};

use crate::CrawlError;
use std::path::Path;

/// Opens (or creates) the catalog database at `path`
pub fn open_storage(path: &Path) -> Result<SqliteCatalogStore, CrawlError> {
    SqliteCatalogStore::new(path)
}

/// Result of an upsert keyed by remote id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Local row id
    pub id: i64,
    /// True if the row did not exist before
    pub created: bool,
}

/// An album as stored in the catalog database
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumRecord {
    pub id: i64,
    pub spotify_id: String,
    pub artist_id: i64,
    pub name: String,
    pub total_tracks: u32,
}
