//! Progress events for external observers
//!
//! Events are fire-and-forget: a dropped or missing receiver never affects
//! the crawl.

use crate::state::EntityStatus;
use serde::Serialize;
use tokio::sync::mpsc;

/// A single progress notification
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CrawlEvent {
    SeedStart {
        seed: String,
        index: usize,
        total: usize,
        offset: u32,
    },
    SeedTotal {
        seed: String,
        total_artists: u32,
        offset: u32,
    },
    SeedDone {
        seed: String,
        hydrated: bool,
    },
    ArtistStart {
        artist_id: String,
        name: String,
    },
    ArtistResult {
        artist_id: String,
        status: EntityStatus,
    },
    ArtistAlbumTotal {
        artist_id: String,
        total_albums: u32,
    },
    AlbumStart {
        album_id: String,
        name: String,
    },
    AlbumResult {
        album_id: String,
        status: EntityStatus,
    },
    AlbumTrackTotal {
        album_id: String,
        total_tracks: u32,
    },
    TrackResult {
        track_id: String,
        status: EntityStatus,
    },
}

/// Optional destination for progress events
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<CrawlEvent>>,
}

impl EventSink {
    /// A sink that discards everything
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Creates a sink and the receiver that observes it
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CrawlEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: CrawlEvent) {
        if let Some(tx) = &self.tx {
            // Receiver may be gone
            let _ = tx.send(event);
        }
    }
}
