//! Periodic Poller
//!
//! Refreshes the default query on a fixed interval, diffs the new snapshot
//! against the one seen on the previous cycle and pushes both to the
//! update sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::QuoteAggregator;
use crate::application::ports::UpdateSink;
use crate::domain::aggregation::diff;
use crate::domain::quote::Snapshot;
use crate::infrastructure::metrics;

/// Progress counters shared with the health endpoints.
#[derive(Debug, Default)]
pub struct PollerStatus {
    last_poll_at: RwLock<Option<DateTime<Utc>>>,
    cycles: AtomicU64,
    last_snapshot_size: AtomicUsize,
    last_update_count: AtomicUsize,
}

impl PollerStatus {
    /// Create a status with no completed cycle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record_cycle(&self, snapshot_size: usize, update_count: usize) {
        *self.last_poll_at.write() = Some(Utc::now());
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.last_snapshot_size.store(snapshot_size, Ordering::Relaxed);
        self.last_update_count.store(update_count, Ordering::Relaxed);
    }

    /// Completion time of the latest cycle.
    #[must_use]
    pub fn last_poll_at(&self) -> Option<DateTime<Utc>> {
        *self.last_poll_at.read()
    }

    /// Number of completed cycles.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Whether at least one cycle has completed.
    #[must_use]
    pub fn has_polled(&self) -> bool {
        self.cycles() > 0
    }

    /// Record count of the latest snapshot.
    #[must_use]
    pub fn last_snapshot_size(&self) -> usize {
        self.last_snapshot_size.load(Ordering::Relaxed)
    }

    /// Update count of the latest cycle.
    #[must_use]
    pub fn last_update_count(&self) -> usize {
        self.last_update_count.load(Ordering::Relaxed)
    }
}

/// Drives the refresh → diff → broadcast cycle.
///
/// The poller is the only owner of the previous-cycle snapshot. It is
/// replaced after every diff, whether or not anything changed.
pub struct QuotePoller {
    aggregator: Arc<QuoteAggregator>,
    sink: Arc<dyn UpdateSink>,
    query: String,
    interval: Duration,
    previous: Arc<Snapshot>,
    status: Arc<PollerStatus>,
}

impl QuotePoller {
    /// Create a poller for `query` that ticks every `interval`.
    #[must_use]
    pub fn new(
        aggregator: Arc<QuoteAggregator>,
        sink: Arc<dyn UpdateSink>,
        query: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            aggregator,
            sink,
            query: query.into(),
            interval,
            previous: Arc::new(Vec::new()),
            status: Arc::new(PollerStatus::new()),
        }
    }

    /// Shared handle to the poller's progress counters.
    #[must_use]
    pub fn status(&self) -> Arc<PollerStatus> {
        Arc::clone(&self.status)
    }

    /// Snapshot observed on the latest cycle.
    #[must_use]
    pub fn previous(&self) -> &Snapshot {
        &self.previous
    }

    /// Run one cycle and return the number of updates published.
    ///
    /// The first cycle diffs against an empty snapshot and publishes no
    /// updates; new subscribers receive it through the snapshot channel.
    pub async fn poll_once(&mut self) -> usize {
        let current = self.aggregator.get_snapshot(&self.query).await;

        let updates = diff(&self.previous, &current);
        let update_count = updates.len();
        self.previous = Arc::clone(&current);

        self.sink.publish_snapshot(Arc::clone(&current));
        if !updates.is_empty() {
            self.sink.publish(updates);
        }

        self.status.record_cycle(current.len(), update_count);
        metrics::record_poll_cycle(current.len(), update_count);
        tracing::debug!(
            query = %self.query,
            tokens = current.len(),
            updates = update_count,
            "Poll cycle complete"
        );

        update_count
    }

    /// Poll until `cancel` fires. The first cycle runs immediately.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            query = %self.query,
            interval_secs = self.interval.as_secs(),
            "Starting poller"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }

        tracing::info!(cycles = self.status.cycles(), "Poller stopped");
    }
}
