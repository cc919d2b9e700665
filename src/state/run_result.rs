//! Per-cycle result summary

use crate::state::{CompletionReason, EntityStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters and completion status for one crawl cycle
///
/// Built fresh by every cycle and handed back to the caller; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub artists_created: u64,
    pub artists_updated: u64,
    /// Artists seen earlier in the same cycle under another seed
    pub artists_skipped: u64,
    /// Artists already hydrated by a previous cycle or earlier in this one
    pub artists_fully_hydrated_skipped: u64,

    pub albums_created: u64,
    pub albums_updated: u64,
    pub albums_skipped: u64,

    pub tracks_created: u64,
    pub tracks_updated: u64,
    pub tracks_skipped: u64,
    pub tracks_failed: u64,

    pub failed_artist_ids: Vec<String>,
    pub failed_track_ids: Vec<String>,

    pub crawled_at: DateTime<Utc>,
    pub completed: bool,
    pub completion_reason: Option<CompletionReason>,
    /// Set when a shutdown request cut the cycle short
    pub cancelled: bool,
}

impl Default for RunResult {
    fn default() -> Self {
        Self::new()
    }
}

impl RunResult {
    pub fn new() -> Self {
        Self {
            artists_created: 0,
            artists_updated: 0,
            artists_skipped: 0,
            artists_fully_hydrated_skipped: 0,
            albums_created: 0,
            albums_updated: 0,
            albums_skipped: 0,
            tracks_created: 0,
            tracks_updated: 0,
            tracks_skipped: 0,
            tracks_failed: 0,
            failed_artist_ids: Vec::new(),
            failed_track_ids: Vec::new(),
            crawled_at: Utc::now(),
            completed: false,
            completion_reason: None,
            cancelled: false,
        }
    }

    pub fn record_artist(&mut self, status: EntityStatus) {
        match status {
            EntityStatus::Created => self.artists_created += 1,
            EntityStatus::Updated => self.artists_updated += 1,
            EntityStatus::Skipped => self.artists_skipped += 1,
            EntityStatus::Failed => {}
        }
    }

    pub fn record_album(&mut self, status: EntityStatus) {
        match status {
            EntityStatus::Created => self.albums_created += 1,
            EntityStatus::Updated => self.albums_updated += 1,
            EntityStatus::Skipped => self.albums_skipped += 1,
            EntityStatus::Failed => {}
        }
    }

    pub fn record_track(&mut self, status: EntityStatus) {
        match status {
            EntityStatus::Created => self.tracks_created += 1,
            EntityStatus::Updated => self.tracks_updated += 1,
            EntityStatus::Skipped => self.tracks_skipped += 1,
            EntityStatus::Failed => self.tracks_failed += 1,
        }
    }

    /// Records a failed artist id once
    pub fn record_failed_artist(&mut self, artist_id: &str) {
        if !self.failed_artist_ids.iter().any(|id| id == artist_id) {
            self.failed_artist_ids.push(artist_id.to_string());
        }
    }

    pub fn record_failed_track(&mut self, track_id: &str) {
        self.tracks_failed += 1;
        self.failed_track_ids.push(track_id.to_string());
    }

    pub fn finish(&mut self, reason: CompletionReason) {
        self.completed = reason.is_complete();
        self.completion_reason = Some(reason);
    }

    /// Total entities created or updated this cycle
    pub fn total_written(&self) -> u64 {
        self.artists_created
            + self.artists_updated
            + self.albums_created
            + self.albums_updated
            + self.tracks_created
            + self.tracks_updated
    }

    /// Returns true if the cycle wrote nothing new to the catalog
    pub fn is_idle(&self) -> bool {
        self.artists_created == 0 && self.albums_created == 0 && self.tracks_created == 0
    }
}
