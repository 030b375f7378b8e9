//! Snapshot diffing for live updates.

use std::collections::HashMap;

use crate::domain::quote::{QuoteRecord, UpdateRecord};

/// Compute the updates between two snapshots of the same query.
///
/// Only addresses present in both snapshots can produce an update. Tokens
/// that first appear in `current` are left to the full-snapshot path that
/// new subscribers receive on connect, and tokens missing from `current`
/// produce no tombstone.
///
/// Price, volume and 1h change are compared exactly. Output follows the
/// order of `current`.
#[must_use]
pub fn diff(previous: &[QuoteRecord], current: &[QuoteRecord]) -> Vec<UpdateRecord> {
    let previous_by_address: HashMap<&str, &QuoteRecord> = previous
        .iter()
        .map(|q| (q.address.as_str(), q))
        .collect();

    current
        .iter()
        .filter(|now| {
            previous_by_address
                .get(now.address.as_str())
                .is_some_and(|before| tracked_fields_changed(before, now))
        })
        .map(QuoteRecord::to_update)
        .collect()
}

fn tracked_fields_changed(before: &QuoteRecord, now: &QuoteRecord) -> bool {
    before.price != now.price
        || before.volume != now.volume
        || before.price_change_1h != now.price_change_1h
}
