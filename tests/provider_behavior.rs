//! Behavior tests for the concrete provider adapters: auth material,
//! error classification, and cache memoization.

use std::sync::Arc;

use chainfeed_core::{
    DataProvider, DuneProvider, HttpError, HyperliquidProvider, Interval, ProviderErrorKind,
    Symbol,
};
use chainfeed_tests::RecordingHttpClient;
use serde_json::json;

fn dune_body() -> String {
    json!({
        "result": {
            "rows": [{"day": "2024-05-01", "volume": 1250.5}],
            "metadata": {"column_names": ["day", "volume"]}
        }
    })
    .to_string()
}

fn eth() -> Symbol {
    "ETH".parse().expect("valid symbol")
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn dune_requests_carry_the_api_key_header() {
    // Given: a Dune provider with a configured key
    let transport = Arc::new(RecordingHttpClient::new());
    transport.enqueue_ok(&dune_body());
    let provider =
        DuneProvider::with_http_client(Arc::clone(&transport) as _, Some(String::from("key-123")));

    // When: any query is fetched
    provider
        .fetch_raw(DuneProvider::query_results(5_745_512))
        .await
        .expect("fetch succeeds");

    // Then: the outgoing request authenticates with the key header
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].headers.get("x-dune-api-key").map(String::as_str),
        Some("key-123")
    );
    assert!(requests[0].url.contains("/query/5745512/results"));
}

#[tokio::test]
async fn dune_without_a_key_never_reaches_the_network() {
    let transport = Arc::new(RecordingHttpClient::new());
    let provider = DuneProvider::with_http_client(Arc::clone(&transport) as _, None);

    let err = provider
        .fetch_raw(DuneProvider::query_results(5_745_512))
        .await
        .expect_err("missing key must fail");

    assert_eq!(err.kind(), ProviderErrorKind::Auth);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn hyperliquid_posts_the_candle_request_body() {
    let transport = Arc::new(RecordingHttpClient::new());
    transport.enqueue_ok(
        &json!([{"t": 1, "o": "1", "h": "2", "l": "0.5", "c": "1.5", "v": "10"}]).to_string(),
    );
    let provider = HyperliquidProvider::with_http_client(Arc::clone(&transport) as _);

    provider
        .fetch_raw(HyperliquidProvider::candle_snapshot(&eth(), Interval::OneHour))
        .await
        .expect("candles fetch");

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let body = requests[0].body.as_deref().expect("POST body present");
    assert!(body.contains("candleSnapshot"));
    assert!(body.contains("\"coin\":\"ETH\""));
    assert!(body.contains("startTime"));
}

// =============================================================================
// Error classification
// =============================================================================

#[tokio::test]
async fn rejected_credentials_surface_as_auth_errors() {
    let transport = Arc::new(RecordingHttpClient::new());
    transport.enqueue_status(403, "{}");
    let provider =
        DuneProvider::with_http_client(Arc::clone(&transport) as _, Some(String::from("bad-key")));

    let err = provider
        .fetch_raw(DuneProvider::query_results(5_745_512))
        .await
        .expect_err("403 must fail");

    assert_eq!(err.kind(), ProviderErrorKind::Auth);
    assert!(!err.retryable());
}

#[tokio::test]
async fn server_errors_are_retryable_upstream_failures() {
    let transport = Arc::new(RecordingHttpClient::new());
    transport.enqueue_status(503, "{}");
    let provider = HyperliquidProvider::with_http_client(Arc::clone(&transport) as _);

    let err = provider
        .fetch_raw(HyperliquidProvider::meta())
        .await
        .expect_err("503 must fail");

    assert_eq!(err.kind(), ProviderErrorKind::Upstream);
    assert!(err.retryable());
}

#[tokio::test]
async fn transport_timeouts_surface_as_timeout_errors() {
    let transport = Arc::new(RecordingHttpClient::new());
    transport.enqueue_error(HttpError::timeout("deadline exceeded"));
    let provider = HyperliquidProvider::with_http_client(Arc::clone(&transport) as _);

    let err = provider
        .fetch_raw(HyperliquidProvider::meta())
        .await
        .expect_err("timeout must fail");

    assert_eq!(err.kind(), ProviderErrorKind::Timeout);
    assert!(err.retryable());
}

#[tokio::test]
async fn undecodable_bodies_are_malformed_and_final() {
    let transport = Arc::new(RecordingHttpClient::new());
    transport.enqueue_ok("this is not json");
    let provider =
        DuneProvider::with_http_client(Arc::clone(&transport) as _, Some(String::from("k")));

    let err = provider
        .fetch_raw(DuneProvider::query_results(5_745_512))
        .await
        .expect_err("garbage must fail");

    assert_eq!(err.kind(), ProviderErrorKind::Malformed);
    assert!(!err.retryable());
}

// =============================================================================
// Cache memoization
// =============================================================================

#[tokio::test]
async fn identical_queries_within_ttl_hit_the_network_once() {
    // Given: a provider whose transport counts requests
    let transport = Arc::new(RecordingHttpClient::new());
    transport.enqueue_ok(&dune_body());
    let provider =
        DuneProvider::with_http_client(Arc::clone(&transport) as _, Some(String::from("k")));
    let spec = DuneProvider::query_results(5_745_512);

    // When: the same query runs twice back to back
    let first = provider.fetch_raw(spec.clone()).await.expect("first fetch");
    let second = provider.fetch_raw(spec).await.expect("second fetch");

    // Then: the second fetch is served from cache
    assert_eq!(first, second);
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn distinct_queries_are_cached_independently() {
    let transport = Arc::new(RecordingHttpClient::new());
    transport.enqueue_ok(&dune_body());
    transport.enqueue_ok(&dune_body());
    let provider =
        DuneProvider::with_http_client(Arc::clone(&transport) as _, Some(String::from("k")));

    provider
        .fetch_raw(DuneProvider::query_results(5_745_512))
        .await
        .expect("first query");
    provider
        .fetch_raw(DuneProvider::query_results(5_745_512).with_param("limit", "1"))
        .await
        .expect("second query");

    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn clearing_the_cache_forces_a_fresh_fetch() {
    let transport = Arc::new(RecordingHttpClient::new());
    transport.enqueue_ok(&dune_body());
    transport.enqueue_ok(&dune_body());
    let provider =
        DuneProvider::with_http_client(Arc::clone(&transport) as _, Some(String::from("k")));
    let spec = DuneProvider::query_results(5_745_512);

    provider.fetch_raw(spec.clone()).await.expect("first fetch");
    provider.clear_cache().await;
    provider.fetch_raw(spec).await.expect("refetch");

    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn failed_fetches_are_never_cached() {
    let transport = Arc::new(RecordingHttpClient::new());
    transport.enqueue_status(503, "{}");
    transport.enqueue_ok(&dune_body());
    let provider =
        DuneProvider::with_http_client(Arc::clone(&transport) as _, Some(String::from("k")));
    let spec = DuneProvider::query_results(5_745_512);

    provider
        .fetch_raw(spec.clone())
        .await
        .expect_err("first attempt fails");
    let frame = provider.fetch_raw(spec).await.expect("second attempt");

    assert_eq!(frame.row_count(), 1);
    assert_eq!(transport.request_count(), 2);
}
