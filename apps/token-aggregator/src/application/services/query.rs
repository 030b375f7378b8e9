//! Token query read path.

use std::num::NonZeroUsize;
use std::sync::Arc;

use rust_decimal::Decimal;

use super::QuoteAggregator;
use crate::domain::query::{Page, SortField, SortOrder, paginate, sort};
use crate::domain::quote::QuoteRecord;

/// A validated client query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenQuery {
    /// Upstream search term.
    pub search: String,
    /// Field to order by.
    pub sort_field: SortField,
    /// Ordering direction.
    pub sort_order: SortOrder,
    /// Page size.
    pub limit: NonZeroUsize,
    /// Address to resume after.
    pub cursor: Option<String>,
}

/// Serves paged, sorted views over aggregated snapshots.
#[derive(Debug, Clone)]
pub struct TokenQueryService {
    aggregator: Arc<QuoteAggregator>,
}

impl TokenQueryService {
    /// Create a query service backed by `aggregator`.
    #[must_use]
    pub const fn new(aggregator: Arc<QuoteAggregator>) -> Self {
        Self { aggregator }
    }

    /// Answer `query`.
    ///
    /// Only tokens with positive trading volume are listed. Records with
    /// no volume reported are treated as untraded.
    pub async fn execute(&self, query: &TokenQuery) -> Page {
        let snapshot = self.aggregator.get_snapshot(&query.search).await;

        let traded: Vec<QuoteRecord> = snapshot
            .iter()
            .filter(|q| q.volume.is_some_and(|v| v > Decimal::ZERO))
            .cloned()
            .collect();

        let ordered = sort(&traded, query.sort_field, query.sort_order);
        paginate(&ordered, query.limit, query.cursor.as_deref())
    }
}
