//! Cross-source record merge.

use std::collections::HashMap;

use crate::domain::quote::{QuoteRecord, Snapshot, TokenAddress};

/// Merge per-source quote lists into one record per token address.
///
/// Records are visited in call order. The first record seen for an address
/// is kept as-is. A later record for the same address becomes authoritative
/// only when its liquidity is strictly greater than the retained record's
/// (absent liquidity counts as zero), so ties keep the earlier record. The
/// authoritative record's present fields win and its absent fields are
/// filled from the other record.
///
/// Output follows first-seen address order.
#[must_use]
pub fn merge(sources: Vec<Vec<QuoteRecord>>) -> Snapshot {
    let capacity = sources.iter().map(Vec::len).sum();
    let mut positions: HashMap<TokenAddress, usize> = HashMap::with_capacity(capacity);
    let mut merged: Snapshot = Vec::with_capacity(capacity);

    for candidate in sources.into_iter().flatten() {
        match positions.get(&candidate.address) {
            None => {
                positions.insert(candidate.address.clone(), merged.len());
                merged.push(candidate);
            }
            Some(&index) => reconcile(&mut merged[index], candidate),
        }
    }

    merged
}

fn reconcile(retained: &mut QuoteRecord, candidate: QuoteRecord) {
    if candidate.liquidity_or_zero() > retained.liquidity_or_zero() {
        let fallback = std::mem::replace(retained, candidate);
        retained.fill_gaps_from(fallback);
    } else {
        retained.fill_gaps_from(candidate);
    }
}
