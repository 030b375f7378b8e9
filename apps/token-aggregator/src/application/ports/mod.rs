//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `QuoteSource`: One upstream quote API
//! - `SnapshotCache`: Keyed snapshot store with per-write TTL
//! - `UpdateSink`: Fan-out of snapshots and update lists to subscribers

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::quote::{QuoteRecord, Snapshot, UpdateRecord};

/// An upstream quote API.
///
/// Implementations absorb their own failures: a source that cannot be
/// reached, answers with an error or returns an unreadable payload yields
/// an empty list and logs the cause itself.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Short label used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Search the source for quotes matching `query`.
    async fn fetch(&self, query: &str) -> Vec<QuoteRecord>;
}

/// Cache store failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The backing store could not serve the request.
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// Keyed snapshot store with a time-to-live per write.
///
/// Writes always replace a whole snapshot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// Fetch the unexpired snapshot stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Arc<Snapshot>>, CacheError>;

    /// Store `snapshot` under `key` for `ttl`.
    async fn set(&self, key: &str, snapshot: Arc<Snapshot>, ttl: Duration)
    -> Result<(), CacheError>;
}

/// Destination for live snapshot data.
#[cfg_attr(test, mockall::automock)]
pub trait UpdateSink: Send + Sync {
    /// Replace the full snapshot handed to newly connected subscribers.
    fn publish_snapshot(&self, snapshot: Arc<Snapshot>);

    /// Broadcast a non-empty list of updates to connected subscribers.
    fn publish(&self, updates: Vec<UpdateRecord>);
}
