//! Snapshot Aggregation
//!
//! Cache-aside orchestration: a cache hit returns the stored snapshot as-is,
//! a miss fetches every source concurrently, merges the results and stores
//! the merged snapshot for the configured TTL.
//!
//! Concurrent misses on the same key share one refresh. The first caller
//! fills a per-key slot and every caller waiting on that slot receives the
//! same snapshot, whether or not the cache store accepted it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::application::ports::{QuoteSource, SnapshotCache};
use crate::domain::aggregation::merge;
use crate::domain::quote::Snapshot;
use crate::infrastructure::metrics::{self, CacheOutcome};

/// Prefix of every snapshot cache key.
pub const CACHE_KEY_PREFIX: &str = "all_tokens";

/// Result slot shared by concurrent misses on one key.
type InFlight = Arc<OnceCell<Arc<Snapshot>>>;

/// Builds and caches merged snapshots per search query.
pub struct QuoteAggregator {
    sources: Vec<Arc<dyn QuoteSource>>,
    cache: Arc<dyn SnapshotCache>,
    ttl: Duration,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

impl std::fmt::Debug for QuoteAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteAggregator")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl QuoteAggregator {
    /// Create an aggregator over `sources`, caching merged snapshots for `ttl`.
    #[must_use]
    pub fn new(
        sources: Vec<Arc<dyn QuoteSource>>,
        cache: Arc<dyn SnapshotCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            sources,
            cache,
            ttl,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Cache key for a search query.
    #[must_use]
    pub fn cache_key(query: &str) -> String {
        format!("{CACHE_KEY_PREFIX}:{query}")
    }

    /// Get the current merged snapshot for `query`.
    ///
    /// Never fails: unreachable sources contribute nothing and an
    /// unavailable cache behaves like a miss, so the worst case is an empty
    /// snapshot.
    pub async fn get_snapshot(&self, query: &str) -> Arc<Snapshot> {
        let key = Self::cache_key(query);

        let cache_failed = match self.cache.get(&key).await {
            Ok(Some(snapshot)) => {
                metrics::record_cache_lookup(CacheOutcome::Hit);
                tracing::debug!(key = %key, "Snapshot cache hit");
                return snapshot;
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Snapshot cache read failed, treating as miss");
                true
            }
        };

        let slot = self.slot(&key);
        let mut refreshed = false;
        let snapshot = Arc::clone(
            slot.get_or_init(|| {
                refreshed = true;
                self.refresh(query, &key)
            })
            .await,
        );
        self.release(&key, &slot);

        let outcome = miss_outcome(cache_failed, refreshed);
        metrics::record_cache_lookup(outcome);
        tracing::debug!(key = %key, outcome = ?outcome, "Snapshot cache miss");

        snapshot
    }

    async fn refresh(&self, query: &str, key: &str) -> Arc<Snapshot> {
        let started = Instant::now();

        let contributions = join_all(self.sources.iter().map(|source| source.fetch(query))).await;
        let snapshot = Arc::new(merge(contributions));

        metrics::record_aggregation_duration(started.elapsed());
        tracing::info!(
            query = %query,
            tokens = snapshot.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Aggregated snapshot"
        );

        if let Err(e) = self.cache.set(key, Arc::clone(&snapshot), self.ttl).await {
            tracing::warn!(key = %key, error = %e, "Snapshot cache write failed");
        }

        snapshot
    }

    fn slot(&self, key: &str) -> InFlight {
        Arc::clone(self.in_flight.lock().entry(key.to_string()).or_default())
    }

    // A later miss must start a fresh slot, so the filled one is dropped
    // unless another caller already replaced it.
    fn release(&self, key: &str, slot: &InFlight) {
        let mut in_flight = self.in_flight.lock();
        if in_flight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            in_flight.remove(key);
        }
    }
}

/// The single lookup outcome recorded for a call that missed the cache.
const fn miss_outcome(cache_failed: bool, refreshed: bool) -> CacheOutcome {
    match (cache_failed, refreshed) {
        (true, _) => CacheOutcome::Error,
        (false, true) => CacheOutcome::Miss,
        (false, false) => CacheOutcome::Coalesced,
    }
}
