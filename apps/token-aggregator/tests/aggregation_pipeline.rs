//! Aggregation Pipeline Integration Tests
//!
//! Drives the aggregator against the real in-memory cache and the poller
//! against the real broadcast hub, with scripted quote sources standing in
//! for the upstream APIs.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::broadcast::error::TryRecvError;

use token_aggregator::infrastructure::cache::InMemorySnapshotCache;
use token_aggregator::{
    BroadcastHub, QuoteAggregator, QuotePoller, QuoteRecord, QuoteSource, SnapshotCache,
    UpdateSink,
};

const TTL: Duration = Duration::from_secs(30);

/// Source that counts fetches, takes `latency` to answer and returns
/// whatever was last scripted.
struct ScriptedSource {
    name: &'static str,
    latency: Duration,
    calls: AtomicUsize,
    records: Mutex<Vec<QuoteRecord>>,
}

impl ScriptedSource {
    fn new(name: &'static str, latency: Duration, records: Vec<QuoteRecord>) -> Arc<Self> {
        Arc::new(Self {
            name,
            latency,
            calls: AtomicUsize::new(0),
            records: Mutex::new(records),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn script(&self, records: Vec<QuoteRecord>) {
        *self.records.lock() = records;
    }
}

#[async_trait]
impl QuoteSource for ScriptedSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, _query: &str) -> Vec<QuoteRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.records.lock().clone()
    }
}

fn quote(address: &str, price: Decimal, liquidity: Decimal) -> QuoteRecord {
    QuoteRecord {
        price: Some(price),
        volume: Some(dec!(100)),
        liquidity: Some(liquidity),
        ..QuoteRecord::new(address)
    }
}

fn aggregator(sources: Vec<Arc<dyn QuoteSource>>) -> Arc<QuoteAggregator> {
    let cache: Arc<dyn SnapshotCache> = Arc::new(InMemorySnapshotCache::new());
    Arc::new(QuoteAggregator::new(sources, cache, TTL))
}

// =============================================================================
// Aggregator
// =============================================================================

#[tokio::test]
async fn concurrent_misses_share_one_fetch() {
    let source = ScriptedSource::new(
        "slow",
        Duration::from_millis(50),
        vec![quote("a", dec!(1), dec!(10))],
    );
    let aggregator = aggregator(vec![source.clone()]);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let aggregator = Arc::clone(&aggregator);
            tokio::spawn(async move { aggregator.get_snapshot("SOL").await })
        })
        .collect();

    let snapshots = futures::future::join_all(handles).await;

    assert_eq!(source.calls(), 1);
    for snapshot in snapshots {
        assert_eq!(snapshot.unwrap().len(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn snapshot_is_reused_until_ttl_expires() {
    let source = ScriptedSource::new(
        "dex",
        Duration::from_millis(5),
        vec![quote("a", dec!(1), dec!(10))],
    );
    let aggregator = aggregator(vec![source.clone()]);

    let first = aggregator.get_snapshot("SOL").await;
    tokio::time::advance(Duration::from_secs(10)).await;
    let second = aggregator.get_snapshot("SOL").await;

    assert_eq!(source.calls(), 1);
    assert!(Arc::ptr_eq(&first, &second));

    source.script(vec![quote("a", dec!(2), dec!(10))]);
    tokio::time::advance(TTL).await;
    let third = aggregator.get_snapshot("SOL").await;

    assert_eq!(source.calls(), 2);
    assert_eq!(third[0].price, Some(dec!(2)));
}

#[tokio::test(start_paused = true)]
async fn sources_are_fetched_concurrently() {
    let dex = ScriptedSource::new(
        "dex",
        Duration::from_millis(100),
        vec![quote("a", dec!(1), dec!(10))],
    );
    let jupiter = ScriptedSource::new(
        "jupiter",
        Duration::from_millis(100),
        vec![quote("b", dec!(2), dec!(10))],
    );
    let aggregator = aggregator(vec![dex.clone(), jupiter.clone()]);

    let started = tokio::time::Instant::now();
    let snapshot = aggregator.get_snapshot("SOL").await;

    // Slowest source, not the sum of both.
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(snapshot.len(), 2);
    assert_eq!(dex.calls(), 1);
    assert_eq!(jupiter.calls(), 1);
}

#[tokio::test]
async fn queries_are_cached_independently() {
    let source = ScriptedSource::new("dex", Duration::ZERO, vec![quote("a", dec!(1), dec!(1))]);
    let aggregator = aggregator(vec![source.clone()]);

    aggregator.get_snapshot("SOL").await;
    aggregator.get_snapshot("BONK").await;
    aggregator.get_snapshot("SOL").await;

    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn merged_snapshot_has_one_record_per_token() {
    let dex = ScriptedSource::new(
        "dex",
        Duration::ZERO,
        vec![
            quote("a", dec!(1), dec!(500)),
            quote("a", dec!(1.1), dec!(50)),
            quote("b", dec!(3), dec!(20)),
        ],
    );
    let jupiter = ScriptedSource::new(
        "jupiter",
        Duration::ZERO,
        vec![
            QuoteRecord {
                name: Some("Token A".to_string()),
                price: Some(dec!(9)),
                ..QuoteRecord::new("a")
            },
            QuoteRecord::new("c"),
        ],
    );
    let aggregator = aggregator(vec![dex, jupiter]);

    let snapshot = aggregator.get_snapshot("SOL").await;

    assert_eq!(snapshot.len(), 3);
    let a = snapshot
        .iter()
        .find(|q| q.address.as_str() == "a")
        .unwrap();
    // Deepest pool wins, gaps are filled from the rest.
    assert_eq!(a.price, Some(dec!(1)));
    assert_eq!(a.liquidity, Some(dec!(500)));
    assert_eq!(a.name.as_deref(), Some("Token A"));
}

#[tokio::test]
async fn all_sources_empty_yields_empty_snapshot() {
    let aggregator = aggregator(vec![
        ScriptedSource::new("dex", Duration::ZERO, Vec::new()),
        ScriptedSource::new("jupiter", Duration::ZERO, Vec::new()),
    ]);

    assert!(aggregator.get_snapshot("SOL").await.is_empty());
}

// =============================================================================
// Poller → Hub
// =============================================================================

#[tokio::test(start_paused = true)]
async fn poller_pushes_changes_through_hub() {
    let source = ScriptedSource::new(
        "dex",
        Duration::ZERO,
        vec![quote("a", dec!(1), dec!(10)), quote("b", dec!(2), dec!(10))],
    );
    let hub = Arc::new(BroadcastHub::with_defaults());
    let sink: Arc<dyn UpdateSink> = hub.clone();
    let mut poller = QuotePoller::new(
        aggregator(vec![source.clone()]),
        sink,
        "SOL",
        Duration::from_secs(15),
    );
    let mut updates = hub.updates_rx();

    assert_eq!(poller.poll_once().await, 0);
    assert_eq!(hub.snapshot().len(), 2);
    assert!(matches!(updates.try_recv(), Err(TryRecvError::Empty)));

    source.script(vec![quote("a", dec!(1.5), dec!(10)), quote("b", dec!(2), dec!(10))]);
    tokio::time::advance(TTL + Duration::from_secs(1)).await;

    assert_eq!(poller.poll_once().await, 1);
    let batch = updates.try_recv().unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].address.as_str(), "a");
    assert_eq!(batch[0].price, Some(dec!(1.5)));
    assert_eq!(hub.snapshot()[0].price, Some(dec!(1.5)));

    let status = poller.status();
    assert_eq!(status.cycles(), 2);
    assert_eq!(status.last_update_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn poller_within_ttl_sees_no_changes() {
    let source = ScriptedSource::new("dex", Duration::ZERO, vec![quote("a", dec!(1), dec!(10))]);
    let hub = Arc::new(BroadcastHub::with_defaults());
    let sink: Arc<dyn UpdateSink> = hub.clone();
    let mut poller = QuotePoller::new(
        aggregator(vec![source.clone()]),
        sink,
        "SOL",
        Duration::from_secs(15),
    );

    poller.poll_once().await;
    source.script(vec![quote("a", dec!(7), dec!(10))]);
    tokio::time::advance(Duration::from_secs(15)).await;

    assert_eq!(poller.poll_once().await, 0);
    assert_eq!(source.calls(), 1);
}
