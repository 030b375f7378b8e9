//! HTTP Server
//!
//! One axum router serves the whole public surface:
//!
//! - `GET /tokens` - Filtered, sorted, paginated token list
//! - `GET /ws` - WebSocket feed (initial list, then live updates)
//! - Health and metrics routes from [`crate::infrastructure::health`]

mod tokens;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::FromRef;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::TokenQueryService;
use crate::infrastructure::broadcast::SharedBroadcastHub;
use crate::infrastructure::config::QuerySettings;
use crate::infrastructure::health::{self, HealthState};

pub use tokens::TokensParams;

// =============================================================================
// Application State
// =============================================================================

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Read path over aggregated snapshots.
    pub query_service: TokenQueryService,
    /// Live data fan-out.
    pub hub: SharedBroadcastHub,
    /// Health reporting.
    pub health: Arc<HealthState>,
    /// Paging limits.
    pub query_settings: QuerySettings,
    /// Search term used when the client sends none.
    pub default_query: Arc<str>,
    /// Cancelled on shutdown; closes open WebSocket sessions.
    pub shutdown: CancellationToken,
}

impl FromRef<AppState> for Arc<HealthState> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.health)
    }
}

/// Build the router for the full HTTP surface.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/tokens", get(tokens::list_tokens))
        .route("/ws", get(ws::ws_handler))
        .merge(health::routes())
        .with_state(state)
}

// =============================================================================
// Server
// =============================================================================

/// HTTP server for the aggregator API.
pub struct HttpServer {
    port: u16,
    state: AppState,
}

impl HttpServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }

    /// Bind to all interfaces and serve until the state's shutdown token
    /// is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError` if binding fails or the server encounters
    /// a fatal error while running.
    pub async fn run(self) -> Result<(), HttpServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(self.port, e.to_string()))?;

        serve(listener, self.state).await
    }
}

/// Serve the router on an already-bound listener until shutdown.
///
/// # Errors
///
/// Returns `HttpServerError::ServerFailed` if the server stops abnormally.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), HttpServerError> {
    let shutdown = state.shutdown.clone();
    let local_addr = listener.local_addr().ok();
    tracing::info!(addr = ?local_addr, "HTTP server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

// =============================================================================
// Errors
// =============================================================================

/// Client-facing request error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A query parameter has an unusable value.
    #[error("invalid `{name}` parameter: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// The query string could not be decoded.
    #[error("invalid query string: {0}")]
    InvalidQuery(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "message": self.to_string() });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}
