//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the remote catalog API and run
//! full crawl cycles against on-disk catalog and memo databases.

use catalog_crawler::api::{AlbumPayload, ArtistPayload, TrackPayload};
use catalog_crawler::config::{
    ApiConfig, Config, CrawlerConfig, DriverConfig, GenreConfig, MemoConfig, OutputConfig,
};
use catalog_crawler::crawler::Coordinator;
use catalog_crawler::memo::{keys, MemoStore};
use catalog_crawler::state::CompletionReason;
use catalog_crawler::storage::{open_storage, CatalogStore};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(server: &MockServer, dir: &TempDir, seeds: &[&str]) -> Config {
    Config {
        crawler: CrawlerConfig {
            request_delay_ms: 0,
            max_retries: 2,
            retry_backoff_ms: 0,
            max_artist_retries: 3,
            search_page_size: 50,
        },
        api: ApiConfig {
            base_url: server.uri(),
            access_token: Some("test-token".to_string()),
            timeout_secs: 5,
        },
        memo: MemoConfig {
            connection: Some(db_path(dir, "memo.db")),
            namespace: "crawl_catalog".to_string(),
            ttl_seconds: 0,
        },
        output: OutputConfig {
            database_path: db_path(dir, "catalog.db"),
        },
        driver: DriverConfig::default(),
        genres: GenreConfig {
            seeds: seeds.iter().map(|s| s.to_string()).collect(),
        },
    }
}

fn db_path(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

fn coordinator(config: Config) -> Coordinator {
    Coordinator::from_config(config, CancellationToken::new()).unwrap()
}

fn artist_json(id: &str) -> Value {
    json!({ "id": id, "name": format!("Artist {}", id), "genres": ["jazz"], "popularity": 10 })
}

fn album_json(id: &str, total_tracks: u32) -> Value {
    json!({
        "id": id,
        "name": format!("Album {}", id),
        "total_tracks": total_tracks,
        "release_date": "1959-08-17",
        "album_type": "album"
    })
}

fn track_json(id: &str, number: u32) -> Value {
    json!({
        "id": id,
        "name": format!("Track {}", id),
        "track_number": number,
        "disc_number": 1,
        "duration_ms": 180000,
        "explicit": false
    })
}

/// Mounts a genre search returning `artist_ids` at offset 0
async fn mount_search(server: &MockServer, genre: &str, artist_ids: &[&str]) {
    let items: Vec<Value> = artist_ids.iter().map(|id| artist_json(id)).collect();
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", format!("genre:\"{}\"", genre)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": { "items": items, "total": artist_ids.len() }
        })))
        .mount(server)
        .await;
}

/// Mounts every endpoint needed to hydrate one artist with one album
async fn mount_artist_catalog(
    server: &MockServer,
    artist_id: &str,
    album_id: &str,
    tracks: &[(&str, u32)],
    expected_album_listings: u64,
) {
    let album = album_json(album_id, tracks.len() as u32);
    let track_items: Vec<Value> = tracks.iter().map(|(id, n)| track_json(id, *n)).collect();
    let track_ids: Vec<&str> = tracks.iter().map(|(id, _)| *id).collect();

    Mock::given(method("GET"))
        .and(path(format!("/artists/{}", artist_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(artist_json(artist_id)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/artists/{}/albums", artist_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [album.clone()],
            "total": 1
        })))
        .expect(expected_album_listings)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/albums"))
        .and(query_param("ids", album_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "albums": [album] })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/albums/{}/tracks", album_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": track_items.clone(),
            "total": tracks.len()
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/tracks"))
        .and(query_param("ids", track_ids.join(",")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tracks": track_items })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_single_seed_full_hydration() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_search(&server, "jazz", &["A1"]).await;
    mount_artist_catalog(&server, "A1", "AL1", &[("T1", 1), ("T2", 2)], 1).await;

    let config = create_test_config(&server, &dir, &["jazz"]);
    let mut coordinator = coordinator(config.clone());
    let result = coordinator.run_cycle().await.unwrap();

    assert_eq!(result.artists_created, 1);
    assert_eq!(result.albums_created, 1);
    assert_eq!(result.tracks_created, 2);
    assert!(result.failed_artist_ids.is_empty());
    assert!(result.completed);
    assert_eq!(
        result.completion_reason,
        Some(CompletionReason::AllGenresHydrated)
    );

    let storage = open_storage(Path::new(&config.output.database_path)).unwrap();
    assert_eq!(storage.count_artists().unwrap(), 1);
    assert_eq!(storage.count_albums().unwrap(), 1);
    assert_eq!(storage.count_tracks().unwrap(), 2);
}

#[tokio::test]
async fn test_rerun_after_completion_creates_nothing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_search(&server, "jazz", &["A1"]).await;
    // The second run learns A1 is hydrated from the catalog database
    mount_artist_catalog(&server, "A1", "AL1", &[("T1", 1), ("T2", 2)], 1).await;

    let config = create_test_config(&server, &dir, &["jazz"]);
    let first = coordinator(config.clone()).run_cycle().await.unwrap();
    assert!(first.completed);

    let second = coordinator(config).run_cycle().await.unwrap();

    assert_eq!(second.artists_created, 0);
    assert_eq!(second.albums_created, 0);
    assert_eq!(second.tracks_created, 0);
    assert_eq!(second.artists_fully_hydrated_skipped, 1);
    assert!(second.completed);
}

#[tokio::test]
async fn test_artist_found_under_two_seeds_is_crawled_once() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_search(&server, "jazz", &["A1"]).await;
    mount_search(&server, "bebop", &["A1"]).await;
    mount_artist_catalog(&server, "A1", "AL1", &[("T1", 1)], 1).await;

    let config = create_test_config(&server, &dir, &["jazz", "bebop"]);
    let result = coordinator(config).run_cycle().await.unwrap();

    assert_eq!(result.artists_created, 1);
    assert_eq!(result.artists_skipped, 1);
    assert!(result.completed);
}

#[tokio::test]
async fn test_stored_album_short_circuits_track_listing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir, &["jazz"]);

    // Catalog already holds AL1 with both tracks
    {
        let mut storage = open_storage(Path::new(&config.output.database_path)).unwrap();
        let artist = storage
            .upsert_artist(&ArtistPayload {
                id: "A1".to_string(),
                name: "Artist A1".to_string(),
                genres: vec![],
                popularity: None,
            })
            .unwrap();
        let album = storage
            .upsert_album(
                &AlbumPayload {
                    id: "AL1".to_string(),
                    name: "Album AL1".to_string(),
                    total_tracks: 2,
                    release_date: None,
                    album_type: None,
                },
                artist.id,
            )
            .unwrap();
        for (id, number) in [("T1", 1), ("T2", 2)] {
            storage
                .upsert_track(
                    &TrackPayload {
                        id: id.to_string(),
                        name: id.to_string(),
                        track_number: Some(number),
                        disc_number: Some(1),
                        duration_ms: None,
                        explicit: false,
                    },
                    album.id,
                )
                .unwrap();
        }
    }

    // Skip the bootstrap so the album is found through the catalog lookup
    {
        let mut memo = MemoStore::from_config(&config.memo, 3);
        let meta = memo.key(keys::META);
        memo.hash_set(&meta, keys::META_SEEDED_FROM_DB, "1");
    }

    mount_search(&server, "jazz", &["A1"]).await;
    Mock::given(method("GET"))
        .and(path("/artists/A1/albums"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [album_json("AL1", 2)],
            "total": 1
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/albums"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "albums": [album_json("AL1", 2)] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/albums/AL1/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let result = coordinator(config).run_cycle().await.unwrap();

    assert_eq!(result.artists_updated, 1);
    assert_eq!(result.albums_skipped, 1);
    assert_eq!(result.tracks_created, 0);
    assert!(result.completed);
}

#[tokio::test]
async fn test_retry_budget_is_bounded_across_cycles() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server, &dir, &["jazz"]);
    config.crawler.max_artist_retries = 2;

    mount_search(&server, "jazz", &["A1"]).await;
    Mock::given(method("GET"))
        .and(path("/artists/A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(artist_json("A1")))
        .mount(&server)
        .await;
    // One attempt from the seed pass and one from the sweep, then no more
    Mock::given(method("GET"))
        .and(path("/artists/A1/albums"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such artist"))
        .expect(2)
        .mount(&server)
        .await;

    let mut coordinator = coordinator(config);

    let first = coordinator.run_cycle().await.unwrap();
    assert_eq!(first.failed_artist_ids, vec!["A1".to_string()]);
    assert_eq!(
        first.completion_reason,
        Some(CompletionReason::ArtistsNotHydrated)
    );

    let second = coordinator.run_cycle().await.unwrap();
    assert!(second.failed_artist_ids.is_empty());
    assert!(!second.completed);

    let failed = coordinator.memo().key(keys::FAILED_ARTISTS);
    assert!(coordinator.memo().is_member(&failed, "A1"));
}

#[tokio::test]
async fn test_seed_resumes_from_persisted_offset() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server, &dir, &["jazz"]);
    config.crawler.search_page_size = 1;

    {
        let mut memo = MemoStore::from_config(&config.memo, 3);
        let offsets = memo.key(keys::SEED_OFFSETS);
        memo.hash_set(&offsets, "jazz", "1");
    }

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": { "items": [artist_json("A1")], "total": 2 }
        })))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("offset", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": { "items": [artist_json("A2")], "total": 2 }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": { "items": [], "total": 2 }
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_artist_catalog(&server, "A2", "AL2", &[("T9", 1)], 1).await;

    let result = coordinator(config).run_cycle().await.unwrap();

    assert_eq!(result.artists_created, 1);
    assert!(result.completed);
}

#[tokio::test]
async fn test_throttled_search_is_retried() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_search(&server, "jazz", &["A1"]).await;
    mount_artist_catalog(&server, "A1", "AL1", &[("T1", 1)], 1).await;

    let config = create_test_config(&server, &dir, &["jazz"]);
    let result = coordinator(config).run_cycle().await.unwrap();

    assert_eq!(result.artists_created, 1);
    assert!(result.completed);
}

#[tokio::test]
async fn test_failing_search_leaves_seed_incomplete() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &dir, &["jazz"]);
    let result = coordinator(config).run_cycle().await.unwrap();

    assert!(!result.completed);
    assert_eq!(
        result.completion_reason,
        Some(CompletionReason::SeedDiscoveryIncomplete)
    );
    assert_eq!(result.artists_created, 0);
}
