//! Statistics generation from the catalog database
//!
//! This module provides functionality for extracting and displaying
//! catalog statistics from the storage layer.

use crate::storage::CatalogStore;
use crate::Result;
use serde::Serialize;

/// Entities in the catalog that still need hydration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MissingSummary {
    /// Artists with no albums, or with at least one incomplete album
    pub artists_not_fully_hydrated: u64,

    /// Albums whose stored track count is below their declared total
    pub albums_not_fully_hydrated: u64,
}

impl MissingSummary {
    pub fn is_empty(&self) -> bool {
        self.artists_not_fully_hydrated == 0 && self.albums_not_fully_hydrated == 0
    }
}

/// Catalog statistics summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogStatistics {
    pub artists: u64,
    pub albums: u64,
    pub tracks: u64,
    pub missing: MissingSummary,
}

/// Counts the artists and albums that are not fully hydrated
pub fn load_missing_summary(storage: &dyn CatalogStore) -> Result<MissingSummary> {
    Ok(MissingSummary {
        artists_not_fully_hydrated: storage.count_unhydrated_artists()?,
        albums_not_fully_hydrated: storage.count_unhydrated_albums()?,
    })
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn CatalogStore) -> Result<CatalogStatistics> {
    Ok(CatalogStatistics {
        artists: storage.count_artists()?,
        albums: storage.count_albums()?,
        tracks: storage.count_tracks()?,
        missing: load_missing_summary(storage)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CatalogStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Overview:");
    println!("  Artists: {}", stats.artists);
    println!("  Albums: {}", stats.albums);
    println!("  Tracks: {}", stats.tracks);
    println!();

    println!("Missing Hydration:");
    println!(
        "  Artists not fully hydrated: {}",
        stats.missing.artists_not_fully_hydrated
    );
    println!(
        "  Albums not fully hydrated: {}",
        stats.missing.albums_not_fully_hydrated
    );
    println!();

    let hydrated = stats
        .albums
        .saturating_sub(stats.missing.albums_not_fully_hydrated);
    let rate = if stats.albums > 0 {
        (hydrated as f64 / stats.albums as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Album Hydration: {:.1}% ({} / {} albums complete)",
        rate, hydrated, stats.albums
    );
}
