//! Integration tests for the OMDb client against a fake server
//!
//! Covers cache-through behavior, error mapping and cancellation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakeOmdb;
use moviefind::cache::{CacheManager, MemoryStorage, Storage, DEFAULT_TTL};
use moviefind::data::{ClientConfig, OmdbClient, OmdbError, SearchResult};
use tokio_util::sync::CancellationToken;

fn create_client(server: &FakeOmdb) -> (OmdbClient, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let config = ClientConfig {
        api_key: Some("test-key".to_string()),
        base_url: server.base_url(),
        cache_ttl: DEFAULT_TTL,
    };
    let client = OmdbClient::new(config, CacheManager::new(storage.clone()));
    (client, storage)
}

#[tokio::test]
async fn test_search_success_is_parsed_and_cached() {
    let server = FakeOmdb::start().await;
    let (client, storage) = create_client(&server);

    let result = client
        .search_movies("batman", 1, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.total_results, 42);
    assert_eq!(result.movies.len(), 1);
    assert_eq!(result.movies[0].imdb_id, "tt-batman");

    let raw = storage
        .get_item("omdb_cache_search_batman_1")
        .unwrap()
        .expect("result should be cached");
    let envelope: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(envelope["data"]["totalResults"], 42);
    assert_eq!(envelope["ttl"], 30 * 60 * 1000);
}

#[tokio::test]
async fn test_repeated_search_uses_cache() {
    let server = FakeOmdb::start().await;
    let (client, _storage) = create_client(&server);
    let token = CancellationToken::new();

    let first = client.search_movies("batman", 1, &token).await.unwrap();
    let second = client.search_movies("batman", 1, &token).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn test_different_pages_are_cached_separately() {
    let server = FakeOmdb::start().await;
    let (client, _storage) = create_client(&server);
    let token = CancellationToken::new();

    client.search_movies("batman", 1, &token).await.unwrap();
    client.search_movies("batman", 2, &token).await.unwrap();

    assert_eq!(server.hits(), 2);
    assert!(client.cache().get::<SearchResult>("search_batman_2").is_some());
}

#[tokio::test]
async fn test_query_is_percent_encoded() {
    let server = FakeOmdb::start().await;
    let (client, _storage) = create_client(&server);

    client
        .search_movies("star wars & more", 1, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(server.searches(), vec!["star wars & more".to_string()]);
}

#[tokio::test]
async fn test_rate_limit_is_reported_and_not_cached() {
    let server = FakeOmdb::start().await;
    let (client, storage) = create_client(&server);

    let err = client
        .search_movies("ratelimited", 1, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, OmdbError::RateLimited));
    assert!(err.is_retryable());
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_auth_failures() {
    let server = FakeOmdb::start().await;
    let (client, _storage) = create_client(&server);

    let err = client
        .search_movies("forbidden", 1, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OmdbError::Auth));

    // Missing key: the provider answers 401
    let config = ClientConfig {
        api_key: None,
        base_url: server.base_url(),
        cache_ttl: DEFAULT_TTL,
    };
    let keyless = OmdbClient::new(config, CacheManager::new(Arc::new(MemoryStorage::new())));
    let err = keyless.movie_details("tt1").await.unwrap_err();
    assert!(matches!(err, OmdbError::Auth));
}

#[tokio::test]
async fn test_server_error_carries_status() {
    let server = FakeOmdb::start().await;
    let (client, storage) = create_client(&server);

    let err = client
        .search_movies("broken", 1, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, OmdbError::Http { status: 500 }));
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_provider_not_found() {
    let server = FakeOmdb::start().await;
    let (client, storage) = create_client(&server);

    let err = client
        .search_movies("nothing", 1, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, OmdbError::NotFound(ref m) if m == "Movie not found!"));
    assert_eq!(err.to_string(), "Movie not found!");
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_non_json_body_is_invalid_response() {
    let server = FakeOmdb::start().await;
    let (client, _storage) = create_client(&server);

    let err = client
        .search_movies("garbled", 1, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, OmdbError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let config = ClientConfig {
        api_key: Some("test-key".to_string()),
        base_url: "http://127.0.0.1:9/".to_string(),
        cache_ttl: DEFAULT_TTL,
    };
    let client = OmdbClient::new(config, CacheManager::new(Arc::new(MemoryStorage::new())));

    let err = client
        .search_movies("batman", 1, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, OmdbError::Network(_)));
    assert!(err.to_string().contains("Network error"));
}

#[tokio::test]
async fn test_cancel_mid_flight() {
    let server = FakeOmdb::start().await;
    let (client, storage) = create_client(&server);
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = client
        .search_movies("slowquery", 1, &token)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_details_success_is_cached() {
    let server = FakeOmdb::start().await;
    let (client, storage) = create_client(&server);

    let details = client.movie_details("tt0372784").await.unwrap();
    assert_eq!(details.imdb_id, "tt0372784");
    assert_eq!(details.title.as_deref(), Some("Movie tt0372784"));
    assert_eq!(details.runtime_minutes(), 140);
    assert_eq!(details.extra["Response"], "True");

    let again = client.movie_details("tt0372784").await.unwrap();
    assert_eq!(again, details);
    assert_eq!(server.hits(), 1);
    assert!(storage
        .get_item("omdb_cache_details_tt0372784")
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_details_not_found() {
    let server = FakeOmdb::start().await;
    let (client, storage) = create_client(&server);

    let err = client.movie_details("tt404").await.unwrap_err();

    assert!(matches!(err, OmdbError::NotFound(ref m) if m == "Incorrect IMDb ID."));
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_expired_entry_is_refetched() {
    let server = FakeOmdb::start().await;
    let (client, storage) = create_client(&server);

    let aged = serde_json::json!({
        "data": {"movies": [], "totalResults": 0},
        "timestamp": chrono::Utc::now().timestamp_millis() - 60_000,
        "ttl": 1_000,
    });
    storage
        .set_item("omdb_cache_search_batman_1", &aged.to_string())
        .unwrap();

    let result = client
        .search_movies("batman", 1, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.total_results, 42);
    assert_eq!(server.hits(), 1);
}
