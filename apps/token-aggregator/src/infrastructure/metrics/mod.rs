//! Prometheus Metrics Module
//!
//! Exposes aggregator metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Cache**: Snapshot lookups by outcome
//! - **Upstream**: Requests, retries and record counts per source
//! - **Polling**: Cycles completed and updates published
//! - **Subscribers**: Connected WebSocket clients and dropped messages
//! - **Latency**: Time spent building a snapshot
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle created by the first one.
///
/// # Panics
///
/// Panics if another global recorder was installed outside this function.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "token_aggregator_cache_lookups_total",
        "Snapshot cache lookups by outcome"
    );

    // Upstream
    describe_counter!(
        "token_aggregator_upstream_requests_total",
        "Upstream API requests by source and outcome"
    );
    describe_counter!(
        "token_aggregator_upstream_retries_total",
        "Upstream API retry attempts by source"
    );
    describe_gauge!(
        "token_aggregator_upstream_records",
        "Records returned by the latest fetch per source"
    );

    // Polling
    describe_counter!(
        "token_aggregator_poll_cycles_total",
        "Completed poll cycles"
    );
    describe_gauge!(
        "token_aggregator_snapshot_tokens",
        "Token count of the latest polled snapshot"
    );
    describe_counter!(
        "token_aggregator_updates_published_total",
        "Update records broadcast to subscribers"
    );

    // Subscribers
    describe_gauge!(
        "token_aggregator_ws_subscribers",
        "Connected WebSocket subscribers"
    );
    describe_counter!(
        "token_aggregator_messages_dropped_total",
        "Update batches skipped by lagging subscribers"
    );

    describe_histogram!(
        "token_aggregator_aggregation_seconds",
        "Time to fetch and merge a snapshot from all sources"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outcome of a snapshot cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Unexpired snapshot found.
    Hit,
    /// No snapshot stored.
    Miss,
    /// Found after waiting on a concurrent refresh of the same key.
    Coalesced,
    /// Store failed; handled as a miss.
    Error,
}

impl CacheOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Coalesced => "coalesced",
            Self::Error => "error",
        }
    }
}

/// Outcome of one upstream request (after retries).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamOutcome {
    /// Payload received and decoded.
    Success,
    /// Transport, status or decode failure.
    Failure,
}

impl UpstreamOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Record a snapshot cache lookup.
pub fn record_cache_lookup(outcome: CacheOutcome) {
    counter!(
        "token_aggregator_cache_lookups_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a completed upstream request.
pub fn record_upstream_request(source: &'static str, outcome: UpstreamOutcome) {
    counter!(
        "token_aggregator_upstream_requests_total",
        "source" => source,
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record an upstream retry attempt.
pub fn record_upstream_retry(source: &'static str) {
    counter!(
        "token_aggregator_upstream_retries_total",
        "source" => source
    )
    .increment(1);
}

/// Record how many records a source contributed.
#[allow(clippy::cast_precision_loss)]
pub fn record_source_records(source: &'static str, count: usize) {
    gauge!(
        "token_aggregator_upstream_records",
        "source" => source
    )
    .set(count as f64);
}

/// Record a completed poll cycle.
#[allow(clippy::cast_precision_loss)]
pub fn record_poll_cycle(snapshot_size: usize, update_count: usize) {
    counter!("token_aggregator_poll_cycles_total").increment(1);
    gauge!("token_aggregator_snapshot_tokens").set(snapshot_size as f64);
    counter!("token_aggregator_updates_published_total").increment(update_count as u64);
}

/// Update the connected WebSocket subscriber count.
#[allow(clippy::cast_precision_loss)]
pub fn set_ws_subscribers(count: usize) {
    gauge!("token_aggregator_ws_subscribers").set(count as f64);
}

/// Record update batches a lagging subscriber skipped.
pub fn record_messages_dropped(count: u64) {
    counter!("token_aggregator_messages_dropped_total").increment(count);
}

/// Record snapshot aggregation duration.
pub fn record_aggregation_duration(duration: Duration) {
    histogram!("token_aggregator_aggregation_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
