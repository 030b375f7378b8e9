//! Health Check and Metrics Endpoints
//!
//! Status reporting for orchestrators, load balancers and monitoring.
//!
//! # Endpoints
//!
//! - `GET /health` - JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (first poll completed)
//! - `GET /metrics` - Prometheus metrics in text format

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::services::PollerStatus;
use crate::infrastructure::broadcast::SharedBroadcastHub;
use crate::infrastructure::metrics::get_metrics_handle;

/// Missed poll cycles tolerated before the service reports unhealthy.
const STALE_AFTER_CYCLES: u32 = 3;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Poller progress.
    pub poller: PollerInfo,
    /// Live subscriber counts.
    pub subscribers: SubscriberInfo,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Polling on schedule with data from upstream.
    Healthy,
    /// Polling on schedule, but every source came back empty.
    Degraded,
    /// No poll has completed recently.
    Unhealthy,
}

/// Poller progress.
#[derive(Debug, Clone, Serialize)]
pub struct PollerInfo {
    /// Completed cycles.
    pub cycles: u64,
    /// Completion time of the latest cycle.
    pub last_poll_at: Option<DateTime<Utc>>,
    /// Tokens in the latest snapshot.
    pub snapshot_tokens: usize,
    /// Updates published by the latest cycle.
    pub last_update_count: usize,
}

/// Live subscriber counts.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriberInfo {
    /// Connected WebSocket clients.
    pub connected: usize,
    /// Open update channel receivers.
    pub update_receivers: usize,
}

// =============================================================================
// Health State
// =============================================================================

/// Shared state for the health endpoints.
#[derive(Debug)]
pub struct HealthState {
    version: String,
    started_at: Instant,
    poll_interval: Duration,
    poller: Arc<PollerStatus>,
    hub: SharedBroadcastHub,
}

impl HealthState {
    /// Create health state over the poller's counters and the broadcast hub.
    #[must_use]
    pub fn new(
        version: impl Into<String>,
        poll_interval: Duration,
        poller: Arc<PollerStatus>,
        hub: SharedBroadcastHub,
    ) -> Self {
        Self {
            version: version.into(),
            started_at: Instant::now(),
            poll_interval,
            poller,
            hub,
        }
    }
}

/// Routes served by this module, mergeable into any router whose state
/// yields an `Arc<HealthState>`.
pub fn routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    Arc<HealthState>: FromRef<S>,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    if state.poller.has_polled() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

fn build_health_response(state: &HealthState) -> HealthResponse {
    let poller = PollerInfo {
        cycles: state.poller.cycles(),
        last_poll_at: state.poller.last_poll_at(),
        snapshot_tokens: state.poller.last_snapshot_size(),
        last_update_count: state.poller.last_update_count(),
    };
    let hub = state.hub.stats();
    let now = Utc::now();

    HealthResponse {
        status: determine_health_status(&poller, now, state.poll_interval),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: now,
        poller,
        subscribers: SubscriberInfo {
            connected: hub.subscribers,
            update_receivers: hub.update_receivers,
        },
    }
}

fn determine_health_status(
    poller: &PollerInfo,
    now: DateTime<Utc>,
    poll_interval: Duration,
) -> HealthStatus {
    let Some(last_poll_at) = poller.last_poll_at else {
        return HealthStatus::Unhealthy;
    };

    let stale_after = poll_interval.saturating_mul(STALE_AFTER_CYCLES);
    let age = (now - last_poll_at).to_std().unwrap_or(Duration::ZERO);
    if age > stale_after {
        return HealthStatus::Unhealthy;
    }

    if poller.snapshot_tokens == 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

// =============================================================================
// Tests
// =============================================================================
