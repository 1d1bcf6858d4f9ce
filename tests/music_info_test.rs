//! Tests for the music info API client against a mock HTTP server

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use track_catalog::config::RetryConfig;
use track_catalog::error::AppError;
use track_catalog::services::{MusicInfoService, TrackInfoProvider};
use track_catalog::test_utils::test_config;

fn info_body() -> serde_json::Value {
    json!({
        "releaseDate": "16.07.2006",
        "text": "Verse one\n\nVerse two",
        "link": "https://www.youtube.com/watch?v=Xsp3_a-PMTw"
    })
}

fn client(server: &MockServer) -> MusicInfoService {
    MusicInfoService::new(server.uri(), test_config().retry).unwrap()
}

#[tokio::test]
async fn test_info_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .and(query_param("group", "Muse"))
        .and(query_param("song", "Supermassive Black Hole"))
        .respond_with(ResponseTemplate::new(200).set_body_json(info_body()))
        .expect(1)
        .mount(&server)
        .await;

    let info = client(&server)
        .info("Muse", "Supermassive Black Hole")
        .await
        .unwrap();

    assert_eq!(info.release_date.to_rfc3339(), "2006-07-16T00:00:00+00:00");
    assert_eq!(info.text, "Verse one\n\nVerse two");
    assert_eq!(info.link, "https://www.youtube.com/watch?v=Xsp3_a-PMTw");
}

#[tokio::test]
async fn test_info_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(info_body()))
        .expect(1)
        .mount(&server)
        .await;

    let info = client(&server).info("Muse", "Hysteria").await;

    assert!(info.is_ok());
}

#[tokio::test]
async fn test_info_retries_bad_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(400))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(info_body()))
        .mount(&server)
        .await;

    assert!(client(&server).info("Muse", "Hysteria").await.is_ok());
}

#[tokio::test]
async fn test_info_gives_up_after_max_duration() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let service = MusicInfoService::new(
        server.uri(),
        RetryConfig {
            delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
            max_duration: Duration::from_millis(60),
            factor: 2.0,
        },
    )
    .unwrap();

    let result = service.info("Muse", "Hysteria").await;

    match result {
        Err(AppError::EnrichmentFailed(msg)) => assert!(msg.contains("attempts"), "{}", msg),
        other => panic!("expected EnrichmentFailed, got {:?}", other.map(|i| i.link)),
    }

    let requests = server.received_requests().await.unwrap();
    assert!(requests.len() > 1, "expected retries, saw {} request(s)", requests.len());
}

#[tokio::test]
async fn test_info_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).info("Nobody", "Nothing").await;

    assert!(matches!(result, Err(AppError::EnrichmentFailed(_))));
}

#[tokio::test]
async fn test_info_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"text\": 42"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).info("Muse", "Hysteria").await;

    assert!(matches!(result, Err(AppError::EnrichmentFailed(_))));
}

#[tokio::test]
async fn test_info_rejects_bad_release_date() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "releaseDate": "2006-07-16",
            "text": "",
            "link": "https://example.com"
        })))
        .mount(&server)
        .await;

    let result = client(&server).info("Muse", "Hysteria").await;

    assert!(matches!(result, Err(AppError::EnrichmentFailed(_))));
}
