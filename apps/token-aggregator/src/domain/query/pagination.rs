//! Identity-cursor pagination.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::domain::quote::{QuoteRecord, TokenAddress};

/// One page of an ordered snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Records on this page.
    pub data: Vec<QuoteRecord>,
    /// Address to resume after, or `None` on the final page.
    pub next_cursor: Option<TokenAddress>,
}

/// Slice `records` into a page of at most `limit` records.
///
/// The page starts right after the record whose address equals `cursor`.
/// An unknown cursor restarts from the first record. A cursor is only
/// meaningful against the ordering that produced it.
///
/// `next_cursor` is set only when the page is full and more records follow.
#[must_use]
pub fn paginate(records: &[QuoteRecord], limit: NonZeroUsize, cursor: Option<&str>) -> Page {
    let start = cursor
        .and_then(|c| records.iter().position(|q| q.address.as_str() == c))
        .map_or(0, |index| index + 1);

    let limit = limit.get();
    let end = start.saturating_add(limit).min(records.len());
    let data = records[start..end].to_vec();

    let next_cursor = if data.len() == limit && end < records.len() {
        data.last().map(|q| q.address.clone())
    } else {
        None
    };

    Page { data, next_cursor }
}
