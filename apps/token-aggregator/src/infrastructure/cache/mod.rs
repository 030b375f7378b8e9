//! In-Memory Snapshot Cache
//!
//! Process-local `SnapshotCache` keyed by query. Each entry carries its own
//! expiry; expired entries are invisible to reads and are swept on every
//! write, so the map only holds keys written within the last TTL.
//!
//! Expiry is measured with `tokio::time::Instant`, so tests can drive it
//! with a paused clock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::application::ports::{CacheError, SnapshotCache};
use crate::domain::quote::Snapshot;

#[derive(Debug, Clone)]
struct CachedSnapshot {
    snapshot: Arc<Snapshot>,
    expires_at: Instant,
}

impl CachedSnapshot {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Snapshot cache held in process memory.
#[derive(Debug, Default)]
pub struct InMemorySnapshotCache {
    entries: RwLock<HashMap<String, CachedSnapshot>>,
}

impl InMemorySnapshotCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl SnapshotCache for InMemorySnapshotCache {
    async fn get(&self, key: &str) -> Result<Option<Arc<Snapshot>>, CacheError> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| Arc::clone(&entry.snapshot)))
    }

    async fn set(
        &self,
        key: &str,
        snapshot: Arc<Snapshot>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write();

        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            key.to_string(),
            CachedSnapshot {
                snapshot,
                expires_at: now + ttl,
            },
        );

        Ok(())
    }
}
