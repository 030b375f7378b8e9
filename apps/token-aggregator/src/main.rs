//! Token Aggregator Binary
//!
//! Starts the quote aggregation service.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin token-aggregator
//! ```
//!
//! # Environment Variables
//!
//! - `PORT`: HTTP port for API, WebSocket, health and metrics (default: 3000)
//! - `AGGREGATOR_CACHE_TTL_SECS`: Snapshot lifetime (default: 30)
//! - `AGGREGATOR_POLL_INTERVAL_SECS`: Poll interval, below the TTL (default: 15)
//! - `AGGREGATOR_DEFAULT_QUERY`: Search term for polling and `/tokens` (default: SOL)
//! - `AGGREGATOR_DEFAULT_PAGE_SIZE`: Default page size (default: 20)
//! - `AGGREGATOR_MAX_PAGE_SIZE`: Page size cap (default: 100)
//! - `AGGREGATOR_DEXSCREENER_URL`, `AGGREGATOR_JUPITER_URL`: Upstream endpoints
//! - `AGGREGATOR_HTTP_TIMEOUT_SECS`: Upstream request timeout (default: 10)
//! - `AGGREGATOR_MAX_RETRIES`: Upstream retries (default: 3)
//! - `AGGREGATOR_RETRY_BASE_DELAY_MS`, `AGGREGATOR_RETRY_MAX_DELAY_MS`: Retry timing
//! - `AGGREGATOR_UPDATES_CAPACITY`: Buffered update batches per subscriber (default: 1024)
//! - `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`: Span export
//! - `RUST_LOG`: Log filter (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use token_aggregator::infrastructure::broadcast::{BroadcastConfig, BroadcastHub};
use token_aggregator::infrastructure::cache::InMemorySnapshotCache;
use token_aggregator::infrastructure::health::HealthState;
use token_aggregator::infrastructure::telemetry;
use token_aggregator::infrastructure::upstream::{
    DexScreenerSource, JupiterSource, UpstreamHttpClient,
};
use token_aggregator::{
    AggregatorConfig, AppState, HttpServer, QuoteAggregator, QuotePoller, QuoteSource,
    SnapshotCache, TokenQueryService, UpdateSink, init_metrics,
};

/// Time allowed for the poller and server to wind down.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Token Aggregator");

    let _metrics_handle = init_metrics();

    let config = AggregatorConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Upstream sources share one HTTP client
    let http_client = UpstreamHttpClient::from_settings(&config.upstream)
        .context("failed to build upstream HTTP client")?;
    let sources: Vec<Arc<dyn QuoteSource>> = vec![
        Arc::new(DexScreenerSource::new(
            http_client.clone(),
            &config.upstream.dexscreener_url,
        )),
        Arc::new(JupiterSource::new(http_client, &config.upstream.jupiter_url)),
    ];

    let cache: Arc<dyn SnapshotCache> = Arc::new(InMemorySnapshotCache::new());
    let aggregator = Arc::new(QuoteAggregator::new(sources, cache, config.cache.ttl));

    let broadcast_hub = Arc::new(BroadcastHub::new(BroadcastConfig::from(&config.broadcast)));
    let sink: Arc<dyn UpdateSink> = broadcast_hub.clone();

    let poller = QuotePoller::new(
        Arc::clone(&aggregator),
        sink,
        config.cache.default_query.clone(),
        config.cache.poll_interval,
    );

    let health_state = Arc::new(HealthState::new(
        env!("CARGO_PKG_VERSION"),
        config.cache.poll_interval,
        poller.status(),
        Arc::clone(&broadcast_hub),
    ));

    let app_state = AppState {
        query_service: TokenQueryService::new(aggregator),
        hub: broadcast_hub,
        health: health_state,
        query_settings: config.query.clone(),
        default_query: Arc::from(config.cache.default_query.as_str()),
        shutdown: shutdown_token.clone(),
    };

    // Spawn poller
    let poller_task = tokio::spawn(poller.run(shutdown_token.clone()));

    // Spawn HTTP server; a fatal server error brings the process down
    let server = HttpServer::new(config.server.port, app_state);
    let server_shutdown = shutdown_token.clone();
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!(error = %e, "HTTP server error");
            server_shutdown.cancel();
        }
    });

    tracing::info!("Token aggregator ready");

    await_shutdown(shutdown_token).await;

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let _ = poller_task.await;
        let _ = server_task.await;
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Shutdown timed out, exiting anyway"
        );
    }

    tracing::info!("Token aggregator stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &AggregatorConfig) {
    tracing::info!(
        port = config.server.port,
        default_query = %config.cache.default_query,
        cache_ttl_secs = config.cache.ttl.as_secs(),
        poll_interval_secs = config.cache.poll_interval.as_secs(),
        "Configuration loaded"
    );
    tracing::debug!(
        dexscreener_url = %config.upstream.dexscreener_url,
        jupiter_url = %config.upstream.jupiter_url,
        max_retries = config.upstream.max_retries,
        "Upstream endpoints"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for SIGTERM, SIGINT or an internal shutdown request, then cancel
/// every task holding `shutdown_token`.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => {
            tracing::warn!("Internal failure, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
