//! Snapshot sorting.

use std::cmp::Ordering;

use rust_decimal::Decimal;

use crate::domain::quote::QuoteRecord;

/// Numeric field a snapshot can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    /// 24h volume.
    #[default]
    Volume,
    /// 1h price change percentage.
    PriceChange,
    /// Market capitalization.
    MarketCap,
}

impl SortField {
    /// Parse a sort field, falling back to volume for unknown names.
    ///
    /// Accepts both the short names and the wire field names.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pricechange" | "price_change" | "price_1hr_change" => Self::PriceChange,
            "marketcap" | "market_cap" | "market_cap_sol" => Self::MarketCap,
            _ => Self::Volume,
        }
    }

    /// Canonical name of the field.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Volume => "volume",
            Self::PriceChange => "priceChange",
            Self::MarketCap => "marketCap",
        }
    }

    /// Sort key for a record. Absent values read as zero.
    fn key(self, record: &QuoteRecord) -> Decimal {
        let value = match self {
            Self::Volume => record.volume,
            Self::PriceChange => record.price_change_1h,
            Self::MarketCap => record.market_cap,
        };
        value.unwrap_or(Decimal::ZERO)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

impl SortOrder {
    /// Parse a direction. Anything other than `asc` is descending.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        if s.eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    /// Canonical name of the direction.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Return a copy of `records` ordered by `field` in `order`.
///
/// The input is left untouched. Equal keys keep their input order.
#[must_use]
pub fn sort(records: &[QuoteRecord], field: SortField, order: SortOrder) -> Vec<QuoteRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| {
        let ordering: Ordering = field.key(a).cmp(&field.key(b));
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    sorted
}
