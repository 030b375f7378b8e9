//! HTTP API Integration Tests
//!
//! Exercises the full router (token listing and health probes) in-process
//! with `tower::ServiceExt::oneshot`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use token_aggregator::infrastructure::cache::InMemorySnapshotCache;
use token_aggregator::infrastructure::config::QuerySettings;
use token_aggregator::infrastructure::health::HealthState;
use token_aggregator::{
    AppState, BroadcastHub, QuoteAggregator, QuotePoller, QuoteRecord, QuoteSource,
    SnapshotCache, TokenQueryService, UpdateSink, create_router,
};

struct FixedSource {
    records: Vec<QuoteRecord>,
    fetches: Arc<AtomicUsize>,
}

#[async_trait]
impl QuoteSource for FixedSource {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn fetch(&self, query: &str) -> Vec<QuoteRecord> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        // Only the default query has data so `q` is observable.
        if query == "SOL" {
            self.records.clone()
        } else {
            Vec::new()
        }
    }
}

fn token(address: &str, volume: Option<Decimal>) -> QuoteRecord {
    QuoteRecord {
        name: Some(format!("Token {address}")),
        price: Some(dec!(1)),
        volume,
        ..QuoteRecord::new(address)
    }
}

fn default_tokens() -> Vec<QuoteRecord> {
    vec![
        token("a", Some(dec!(100))),
        token("b", Some(dec!(300))),
        token("c", Some(dec!(200))),
        token("dead", Some(dec!(0))),
        token("unknown", None),
    ]
}

struct TestApp {
    router: Router,
    poller: QuotePoller,
    fetches: Arc<AtomicUsize>,
}

fn test_app(records: Vec<QuoteRecord>, query_settings: QuerySettings) -> TestApp {
    let fetches = Arc::new(AtomicUsize::new(0));
    let sources: Vec<Arc<dyn QuoteSource>> = vec![Arc::new(FixedSource {
        records,
        fetches: Arc::clone(&fetches),
    })];
    let cache: Arc<dyn SnapshotCache> = Arc::new(InMemorySnapshotCache::new());
    let aggregator = Arc::new(QuoteAggregator::new(
        sources,
        cache,
        Duration::from_secs(30),
    ));

    let hub = Arc::new(BroadcastHub::with_defaults());
    let sink: Arc<dyn UpdateSink> = hub.clone();
    let poll_interval = Duration::from_secs(15);
    let poller = QuotePoller::new(Arc::clone(&aggregator), sink, "SOL", poll_interval);

    let health = Arc::new(HealthState::new(
        "test-0.0.1",
        poll_interval,
        poller.status(),
        Arc::clone(&hub),
    ));

    let state = AppState {
        query_service: TokenQueryService::new(aggregator),
        hub,
        health,
        query_settings,
        default_query: Arc::from("SOL"),
        shutdown: CancellationToken::new(),
    };

    TestApp {
        router: create_router(state),
        poller,
        fetches,
    }
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(router, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn addresses(page: &Value) -> Vec<&str> {
    page["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["token_address"].as_str().unwrap())
        .collect()
}

// =============================================================================
// GET /tokens
// =============================================================================

#[tokio::test]
async fn tokens_default_to_volume_descending() {
    let app = test_app(default_tokens(), QuerySettings::default());

    let (status, page) = get_json(&app.router, "/tokens").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(addresses(&page), vec!["b", "c", "a"]);
    assert!(page["nextCursor"].is_null());
    assert_eq!(page["data"][0]["volume_sol"], 300.0);
}

#[tokio::test]
async fn repeated_reads_within_ttl_are_identical() {
    let app = test_app(default_tokens(), QuerySettings::default());

    let (first_status, first) = get(&app.router, "/tokens?limit=2").await;
    let (second_status, second) = get(&app.router, "/tokens?limit=2").await;

    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(app.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn tokens_paginate_with_cursor() {
    let app = test_app(default_tokens(), QuerySettings::default());

    let (_, first) = get_json(&app.router, "/tokens?limit=2").await;
    assert_eq!(addresses(&first), vec!["b", "c"]);
    assert_eq!(first["nextCursor"], "c");

    let (_, second) = get_json(&app.router, "/tokens?limit=2&cursor=c").await;
    assert_eq!(addresses(&second), vec!["a"]);
    assert!(second["nextCursor"].is_null());
}

#[tokio::test]
async fn tokens_sort_by_requested_field() {
    let app = test_app(default_tokens(), QuerySettings::default());

    let (_, page) = get_json(&app.router, "/tokens?sortBy=volume&sortOrder=asc").await;

    assert_eq!(addresses(&page), vec!["a", "c", "b"]);
}

#[tokio::test]
async fn tokens_use_search_term() {
    let app = test_app(default_tokens(), QuerySettings::default());

    let (status, page) = get_json(&app.router, "/tokens?q=BONK").await;

    assert_eq!(status, StatusCode::OK);
    assert!(addresses(&page).is_empty());
}

#[tokio::test]
async fn tokens_limit_is_clamped() {
    let settings = QuerySettings {
        default_page_size: NonZeroUsize::new(1).unwrap(),
        max_page_size: NonZeroUsize::new(2).unwrap(),
    };
    let app = test_app(default_tokens(), settings);

    let (_, defaulted) = get_json(&app.router, "/tokens").await;
    assert_eq!(addresses(&defaulted), vec!["b"]);

    let (_, clamped) = get_json(&app.router, "/tokens?limit=50").await;
    assert_eq!(addresses(&clamped), vec!["b", "c"]);
}

#[tokio::test]
async fn tokens_reject_invalid_limit() {
    let app = test_app(default_tokens(), QuerySettings::default());

    for uri in ["/tokens?limit=0", "/tokens?limit=abc", "/tokens?limit=-3"] {
        let (status, body) = get_json(&app.router, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["message"].as_str().unwrap().contains("limit"), "{uri}");
    }
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn liveness_is_always_ok() {
    let app = test_app(Vec::new(), QuerySettings::default());

    let (status, body) = get(&app.router, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn readiness_waits_for_first_poll() {
    let mut app = test_app(default_tokens(), QuerySettings::default());

    let (before, _) = get(&app.router, "/readyz").await;
    assert_eq!(before, StatusCode::SERVICE_UNAVAILABLE);

    app.poller.poll_once().await;

    let (after, body) = get(&app.router, "/readyz").await;
    assert_eq!(after, StatusCode::OK);
    assert_eq!(body, b"READY");
}

#[tokio::test]
async fn health_reports_poller_progress() {
    let mut app = test_app(default_tokens(), QuerySettings::default());

    let (status, health) = get_json(&app.router, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");

    app.poller.poll_once().await;

    let (status, health) = get_json(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["version"], "test-0.0.1");
    assert_eq!(health["poller"]["cycles"], 1);
    assert_eq!(health["poller"]["snapshot_tokens"], 5);
    assert_eq!(health["subscribers"]["connected"], 0);
}

#[tokio::test]
async fn health_is_degraded_with_empty_snapshot() {
    let mut app = test_app(Vec::new(), QuerySettings::default());
    app.poller.poll_once().await;

    let (status, health) = get_json(&app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
}
