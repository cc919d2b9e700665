//! Integration tests for the HTTP catalog client
//!
//! These tests check how remote responses map onto payloads and errors.

use catalog_crawler::api::{ApiError, CatalogApi, SpotifyApi};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> SpotifyApi {
    SpotifyApi::with_client(
        reqwest::Client::new(),
        &server.uri(),
        Some("secret".to_string()),
    )
}

#[tokio::test]
async fn test_search_sends_genre_query_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "genre:\"cool jazz\""))
        .and(query_param("type", "artist"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "20"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": {
                "items": [{ "id": "A1", "name": "Chet", "genres": ["cool jazz"] }],
                "total": 21
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server)
        .search_artists_by_genre("cool jazz", 20, 10)
        .await
        .unwrap();

    assert_eq!(page.total, Some(21));
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, "A1");
    assert_eq!(page.items[0].genres, vec!["cool jazz".to_string()]);
}

#[tokio::test]
async fn test_batch_lookup_drops_null_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/albums"))
        .and(query_param("ids", "AL1,GONE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "albums": [
                { "id": "AL1", "name": "Kind of Blue", "total_tracks": 5 },
                null
            ]
        })))
        .mount(&server)
        .await;

    let albums = client(&server)
        .albums(&["AL1".to_string(), "GONE".to_string()])
        .await
        .unwrap();

    assert_eq!(albums.len(), 1);
    assert_eq!(albums[0].total_tracks, 5);
}

#[tokio::test]
async fn test_throttled_response_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artists/A1"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "4"))
        .mount(&server)
        .await;

    let err = client(&server).artist("A1").await.unwrap_err();

    match err {
        ApiError::Throttled { retry_after } => {
            assert_eq!(retry_after, Some(Duration::from_secs(4)))
        }
        other => panic!("expected throttling, got {:?}", other),
    }
}

#[tokio::test]
async fn test_status_classes_map_to_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artists/BROKEN"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artists/MISSING"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let api = client(&server);

    let server_err = api.artist("BROKEN").await.unwrap_err();
    assert!(matches!(server_err, ApiError::Server { status: 502 }));
    assert!(server_err.is_retryable());

    let client_err = api.artist("MISSING").await.unwrap_err();
    assert_eq!(client_err.status(), Some(404));
    assert!(!client_err.is_retryable());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artists/A1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server).artist("A1").await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}
