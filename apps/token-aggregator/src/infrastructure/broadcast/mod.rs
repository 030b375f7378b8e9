//! Broadcast Channel Adapters
//!
//! Fan-out of poller output to live subscribers.
//!
//! # Architecture
//!
//! The `BroadcastHub` carries two kinds of data:
//! - Update batches on a `tokio::sync::broadcast` channel. Every connected
//!   subscriber sees every batch unless it falls more than the channel
//!   capacity behind, in which case it skips ahead.
//! - The latest full snapshot in a `tokio::sync::watch` slot, read once by
//!   each new subscriber as its initial list.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{broadcast, watch};

use crate::application::ports::UpdateSink;
use crate::domain::quote::{Snapshot, UpdateRecord};
use crate::infrastructure::config::BroadcastSettings;
use crate::infrastructure::metrics;

/// One poll cycle's updates, shared by every subscriber.
pub type UpdateBatch = Arc<[UpdateRecord]>;

/// Configuration for the update channel.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// Batches buffered before lagging subscribers start skipping.
    pub updates_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            updates_capacity: 1024,
        }
    }
}

impl From<&BroadcastSettings> for BroadcastConfig {
    fn from(settings: &BroadcastSettings) -> Self {
        Self {
            updates_capacity: settings.updates_capacity,
        }
    }
}

/// Central hub for live snapshot data.
///
/// ```rust
/// use std::sync::Arc;
/// use token_aggregator::application::ports::UpdateSink;
/// use token_aggregator::domain::quote::QuoteRecord;
/// use token_aggregator::infrastructure::broadcast::BroadcastHub;
///
/// let hub = BroadcastHub::with_defaults();
/// let mut rx = hub.updates_rx();
///
/// let quote = QuoteRecord::new("So111");
/// hub.publish_snapshot(Arc::new(vec![quote.clone()]));
/// hub.publish(vec![quote.to_update()]);
///
/// assert_eq!(hub.snapshot().len(), 1);
/// assert_eq!(rx.try_recv().unwrap().len(), 1);
/// ```
#[derive(Debug)]
pub struct BroadcastHub {
    updates_tx: broadcast::Sender<UpdateBatch>,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
    subscribers: AtomicUsize,
}

impl BroadcastHub {
    /// Create a new broadcast hub with the given configuration.
    #[must_use]
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            updates_tx: broadcast::channel(config.updates_capacity.max(1)).0,
            snapshot_tx: watch::Sender::new(Arc::new(Vec::new())),
            subscribers: AtomicUsize::new(0),
        }
    }

    /// Create a new broadcast hub with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BroadcastConfig::default())
    }

    /// Send an update batch to all subscribers.
    ///
    /// Returns the number of receivers, or `None` if nobody is listening.
    pub fn send_updates(&self, updates: UpdateBatch) -> Option<usize> {
        self.updates_tx.send(updates).ok()
    }

    /// Get a new receiver for update batches.
    #[must_use]
    pub fn updates_rx(&self) -> broadcast::Receiver<UpdateBatch> {
        self.updates_tx.subscribe()
    }

    /// Get the number of active update receivers.
    #[must_use]
    pub fn updates_receiver_count(&self) -> usize {
        self.updates_tx.receiver_count()
    }

    /// Latest full snapshot. Empty until the first poll completes.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot_tx.borrow())
    }

    /// Register a connected subscriber for the lifetime of the guard.
    #[must_use]
    pub fn register_subscriber(self: &Arc<Self>) -> SubscriberGuard {
        let count = self.subscribers.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::set_ws_subscribers(count);
        SubscriberGuard {
            hub: Arc::clone(self),
        }
    }

    /// Get the number of connected subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Relaxed)
    }

    /// Get statistics for the hub.
    #[must_use]
    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            subscribers: self.subscriber_count(),
            update_receivers: self.updates_receiver_count(),
            snapshot_tokens: self.snapshot_tx.borrow().len(),
        }
    }
}

impl UpdateSink for BroadcastHub {
    fn publish_snapshot(&self, snapshot: Arc<Snapshot>) {
        self.snapshot_tx.send_replace(snapshot);
    }

    fn publish(&self, updates: Vec<UpdateRecord>) {
        let count = updates.len();
        let receivers = self.send_updates(updates.into()).unwrap_or(0);
        tracing::debug!(updates = count, receivers, "Broadcast token updates");
    }
}

/// Shared broadcast hub.
pub type SharedBroadcastHub = Arc<BroadcastHub>;

/// Decrements the subscriber count when dropped.
#[derive(Debug)]
pub struct SubscriberGuard {
    hub: SharedBroadcastHub,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        let count = self.hub.subscribers.fetch_sub(1, Ordering::Relaxed) - 1;
        metrics::set_ws_subscribers(count);
    }
}

/// Statistics for the broadcast hub.
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastStats {
    /// Connected WebSocket subscribers.
    pub subscribers: usize,
    /// Open update receivers.
    pub update_receivers: usize,
    /// Tokens in the latest snapshot.
    pub snapshot_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quote::QuoteRecord;

    fn updates(ids: &[&str]) -> Vec<UpdateRecord> {
        ids.iter().map(|id| QuoteRecord::new(*id).to_update()).collect()
    }

    #[test]
    fn snapshot_starts_empty() {
        let hub = BroadcastHub::with_defaults();
        assert!(hub.snapshot().is_empty());
    }

    #[test]
    fn publish_snapshot_replaces_latest() {
        let hub = BroadcastHub::with_defaults();
        hub.publish_snapshot(Arc::new(vec![QuoteRecord::new("a")]));
        hub.publish_snapshot(Arc::new(vec![QuoteRecord::new("b"), QuoteRecord::new("c")]));

        assert_eq!(hub.snapshot().len(), 2);
        assert_eq!(hub.stats().snapshot_tokens, 2);
    }

    #[test]
    fn publish_without_receivers_is_harmless() {
        let hub = BroadcastHub::with_defaults();
        hub.publish(updates(&["a"]));
        assert!(hub.send_updates(updates(&["b"]).into()).is_none());
    }

    #[tokio::test]
    async fn multiple_receivers_get_same_batch() {
        let hub = BroadcastHub::with_defaults();
        let mut rx1 = hub.updates_rx();
        let mut rx2 = hub.updates_rx();

        hub.publish(updates(&["a", "b"]));

        let b1 = rx1.recv().await.unwrap();
        let b2 = rx2.recv().await.unwrap();
        assert!(Arc::ptr_eq(&b1, &b2));
        assert_eq!(b1.len(), 2);
    }

    #[tokio::test]
    async fn lagging_receiver_skips_ahead() {
        let hub = BroadcastHub::new(BroadcastConfig {
            updates_capacity: 2,
        });
        let mut rx = hub.updates_rx();

        for id in ["a", "b", "c"] {
            hub.publish(updates(&[id]));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap()[0].address.as_str(), "b");
    }

    #[test]
    fn subscriber_guard_tracks_count() {
        let hub = Arc::new(BroadcastHub::with_defaults());

        let first = hub.register_subscriber();
        let second = hub.register_subscriber();
        assert_eq!(hub.subscriber_count(), 2);

        drop(first);
        assert_eq!(hub.subscriber_count(), 1);
        drop(second);
        assert_eq!(hub.stats().subscribers, 0);
    }

    #[test]
    fn config_from_settings() {
        let config = BroadcastConfig::from(&BroadcastSettings {
            updates_capacity: 16,
        });
        assert_eq!(config.updates_capacity, 16);
    }
}
