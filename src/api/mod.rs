//! Remote catalog API
//!
//! This module defines the boundary to the third-party catalog:
//! - Payload types for artists, albums and tracks
//! - The [`CatalogApi`] trait every remote backend implements
//! - [`SpotifyApi`], the HTTP implementation
//! - The [`ApiError`] taxonomy used to decide what gets retried

mod spotify;
mod traits;

pub use spotify::{build_http_client, SpotifyApi};
pub use traits::CatalogApi;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by remote catalog calls
#[derive(Debug, Error)]
pub enum ApiError {
    /// The remote asked us to slow down (HTTP 429)
    #[error("Throttled by remote API (retry after {retry_after:?})")]
    Throttled { retry_after: Option<Duration> },

    /// The remote failed on its side (HTTP 5xx)
    #[error("Remote server error: HTTP {status}")]
    Server { status: u16 },

    /// Bad request, not found, unauthorized and other 4xx responses
    #[error("Remote client error: HTTP {status}: {message}")]
    Client { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Remote call cancelled")]
    Cancelled,
}

impl ApiError {
    /// Returns true for errors the rate limiter retries with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled { .. } | Self::Server { .. })
    }

    /// HTTP status associated with this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Throttled { .. } => Some(429),
            Self::Server { status } | Self::Client { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for remote calls
pub type ApiResult<T> = Result<T, ApiError>;

/// An artist as returned by search or by-id lookups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub popularity: Option<u32>,
}

/// An album; listing endpoints return a reduced form of the same shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub total_tracks: u32,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub album_type: Option<String>,
}

/// A track; listing endpoints return a reduced form of the same shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub track_number: Option<u32>,
    #[serde(default)]
    pub disc_number: Option<u32>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub explicit: bool,
}

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    /// Declared total across all pages, when the remote reports it
    #[serde(default)]
    pub total: Option<u32>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: Option<u32>) -> Self {
        Self { items, total }
    }
}

/// Which entity a batch lookup fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Albums,
    Tracks,
}

impl BatchKind {
    /// Maximum ids the remote accepts in a single batch call
    pub fn chunk_size(&self) -> usize {
        match self {
            Self::Albums => 20,
            Self::Tracks => 50,
        }
    }
}
