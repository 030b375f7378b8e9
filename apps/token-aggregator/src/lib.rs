#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Token Aggregator - Quote Reconciliation Service
//!
//! Pulls token quotes from several public DEX APIs, reconciles them into a
//! single snapshot per search query, serves paged views of that snapshot
//! over HTTP and pushes field-level changes to WebSocket subscribers.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Quote types and pure algorithms
//!   - `quote`: Quote records, update projections, token identity
//!   - `aggregation`: Liquidity-weighted merge and snapshot diff
//!   - `query`: Sorting and cursor pagination
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Quote sources, snapshot cache, update sink
//!   - `services`: Cached aggregation, read path, poller
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `upstream`: DexScreener and Jupiter clients with retry
//!   - `cache`: In-memory TTL snapshot store
//!   - `broadcast`: Update fan-out and latest-snapshot slot
//!   - `http`: REST and WebSocket server
//!   - `config`, `health`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//! DexScreener ──┐                              ┌──► GET /tokens
//!               ├──► merge ──► snapshot cache ─┤
//! Jupiter ──────┘                              └──► poller ──► diff ──► hub ──► /ws
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Quote types and algorithms with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::aggregation::{diff, merge};
pub use domain::query::{Page, SortField, SortOrder, paginate, sort};
pub use domain::quote::{QuoteRecord, Snapshot, TokenAddress, UpdateRecord};

// Ports and services
pub use application::ports::{CacheError, QuoteSource, SnapshotCache, UpdateSink};
pub use application::services::{
    PollerStatus, QuoteAggregator, QuotePoller, TokenQuery, TokenQueryService,
};

// Infrastructure config
pub use infrastructure::config::{AggregatorConfig, ConfigError};

// HTTP server
pub use infrastructure::http::{
    ApiError, AppState, HttpServer, HttpServerError, create_router, serve,
};

// Broadcast hub (for integration tests)
pub use infrastructure::broadcast::{
    BroadcastConfig, BroadcastHub, BroadcastStats, SharedBroadcastHub,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
