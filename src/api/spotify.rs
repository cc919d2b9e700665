//! HTTP implementation of the catalog API
//!
//! Talks to a Spotify Web API compatible endpoint using app-level bearer
//! credentials. Responses are mapped onto [`ApiError`] so the rate limiter can
//! tell throttling and server failures apart from everything else.

use crate::api::{
    AlbumPayload, ApiError, ApiResult, ArtistPayload, CatalogApi, Page, TrackPayload,
};
use crate::config::ApiConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Builds an HTTP client for the catalog API
///
/// # Example
///
/// ```no_run
/// use catalog_crawler::config::ApiConfig;
/// use catalog_crawler::api::build_http_client;
///
/// let client = build_http_client(&ApiConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!("catalog-crawler/{}", env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

#[derive(Deserialize)]
struct SearchResponse {
    artists: Page<ArtistPayload>,
}

#[derive(Deserialize)]
struct AlbumsResponse {
    #[serde(default)]
    albums: Vec<Option<AlbumPayload>>,
}

#[derive(Deserialize)]
struct TracksResponse {
    #[serde(default)]
    tracks: Vec<Option<TrackPayload>>,
}

/// Spotify Web API client
pub struct SpotifyApi {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl SpotifyApi {
    /// Creates a client from configuration
    pub fn new(config: &ApiConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        Ok(Self::with_client(
            client,
            &config.base_url,
            config.access_token.clone(),
        ))
    }

    /// Creates a client around an existing `reqwest::Client`
    pub fn with_client(client: Client, base_url: &str, access_token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::Throttled {
                retry_after: parse_retry_after(response.headers()),
            });
        }

        if status.is_server_error() {
            return Err(ApiError::Server {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Client {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Reads a `Retry-After` header expressed in seconds
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let seconds: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

#[async_trait]
impl CatalogApi for SpotifyApi {
    async fn search_artists_by_genre(
        &self,
        genre: &str,
        offset: u32,
        limit: u32,
    ) -> ApiResult<Page<ArtistPayload>> {
        let query = format!("genre:\"{}\"", genre);
        let (limit_param, offset_param) = (limit.to_string(), offset.to_string());
        let request = self.get("/search").query(&[
            ("q", query.as_str()),
            ("type", "artist"),
            ("limit", limit_param.as_str()),
            ("offset", offset_param.as_str()),
        ]);
        let response: SearchResponse = self.send_json(request).await?;
        let mut page = response.artists;
        page.items.truncate(limit as usize);
        Ok(page)
    }

    async fn artist_albums(
        &self,
        artist_id: &str,
        offset: u32,
        limit: u32,
    ) -> ApiResult<Page<AlbumPayload>> {
        let (limit_param, offset_param) = (limit.to_string(), offset.to_string());
        let request = self
            .get(&format!("/artists/{}/albums", artist_id))
            .query(&[
                ("include_groups", "album"),
                ("limit", limit_param.as_str()),
                ("offset", offset_param.as_str()),
            ]);
        self.send_json(request).await
    }

    async fn album_tracks(
        &self,
        album_id: &str,
        offset: u32,
        limit: u32,
    ) -> ApiResult<Page<TrackPayload>> {
        let (limit_param, offset_param) = (limit.to_string(), offset.to_string());
        let request = self
            .get(&format!("/albums/{}/tracks", album_id))
            .query(&[("limit", limit_param), ("offset", offset_param)]);
        self.send_json(request).await
    }

    async fn albums(&self, ids: &[String]) -> ApiResult<Vec<AlbumPayload>> {
        let request = self.get("/albums").query(&[("ids", ids.join(","))]);
        let response: AlbumsResponse = self.send_json(request).await?;
        Ok(response.albums.into_iter().flatten().collect())
    }

    async fn tracks(&self, ids: &[String]) -> ApiResult<Vec<TrackPayload>> {
        let request = self.get("/tracks").query(&[("ids", ids.join(","))]);
        let response: TracksResponse = self.send_json(request).await?;
        Ok(response.tracks.into_iter().flatten().collect())
    }

    async fn artist(&self, artist_id: &str) -> ApiResult<ArtistPayload> {
        let request = self.get(&format!("/artists/{}", artist_id));
        self.send_json(request).await
    }
}
