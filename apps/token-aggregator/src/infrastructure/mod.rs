//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the HTTP surface and process
//! plumbing (configuration, logging, metrics).

/// Upstream quote API adapters (DexScreener, Jupiter).
pub mod upstream;

/// In-memory snapshot cache.
pub mod cache;

/// Broadcast channel adapters for live updates.
pub mod broadcast;

/// REST and WebSocket server.
pub mod http;

/// Configuration loading.
pub mod config;

/// Health check and metrics endpoints.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;
