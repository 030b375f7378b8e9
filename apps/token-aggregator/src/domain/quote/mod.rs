//! Quote Types
//!
//! Canonical representation of one token's market snapshot as seen by a
//! single upstream source or after reconciliation.
//!
//! Field names on the wire keep the `token_*` / `*_sol` shape consumed by
//! existing dashboards, independent of the Rust field names.

use std::borrow::Borrow;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Identity
// =============================================================================

/// Token mint address. The only merge, pagination and diff key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenAddress(String);

impl TokenAddress {
    /// Wrap an address string.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Borrow the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TokenAddress {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TokenAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TokenAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// Quote Record
// =============================================================================

/// One token's quote from a single moment.
///
/// Every field except the address may be absent. Absence is meaningful:
/// during a merge an absent field on the authoritative record is filled
/// from the fallback record, while a present field always wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    /// Token identity.
    #[serde(rename = "token_address")]
    pub address: TokenAddress,
    /// Display name.
    #[serde(rename = "token_name", default)]
    pub name: Option<String>,
    /// Ticker symbol.
    #[serde(rename = "token_ticker", default)]
    pub ticker: Option<String>,
    /// Unit price.
    #[serde(
        rename = "price_sol",
        default,
        with = "rust_decimal::serde::float_option"
    )]
    pub price: Option<Decimal>,
    /// Market capitalization.
    #[serde(
        rename = "market_cap_sol",
        default,
        with = "rust_decimal::serde::float_option"
    )]
    pub market_cap: Option<Decimal>,
    /// 24h trading volume.
    #[serde(
        rename = "volume_sol",
        default,
        with = "rust_decimal::serde::float_option"
    )]
    pub volume: Option<Decimal>,
    /// Liquidity depth. Decides merge authority.
    #[serde(
        rename = "liquidity_sol",
        default,
        with = "rust_decimal::serde::float_option"
    )]
    pub liquidity: Option<Decimal>,
    /// 1h price change percentage.
    #[serde(
        rename = "price_1hr_change",
        default,
        with = "rust_decimal::serde::float_option"
    )]
    pub price_change_1h: Option<Decimal>,
    /// Label of the venue or source the record came from.
    #[serde(rename = "source_dex", default)]
    pub source: Option<String>,
}

impl QuoteRecord {
    /// Create a record carrying only its identity.
    #[must_use]
    pub fn new(address: impl Into<TokenAddress>) -> Self {
        Self {
            address: address.into(),
            name: None,
            ticker: None,
            price: None,
            market_cap: None,
            volume: None,
            liquidity: None,
            price_change_1h: None,
            source: None,
        }
    }

    /// Liquidity with absence read as zero.
    #[must_use]
    pub fn liquidity_or_zero(&self) -> Decimal {
        self.liquidity.unwrap_or(Decimal::ZERO)
    }

    /// Fill every absent field from `other`, keeping present fields.
    ///
    /// The address of `other` is ignored; callers only combine records
    /// that share an identity.
    pub fn fill_gaps_from(&mut self, other: Self) {
        fill(&mut self.name, other.name);
        fill(&mut self.ticker, other.ticker);
        fill(&mut self.price, other.price);
        fill(&mut self.market_cap, other.market_cap);
        fill(&mut self.volume, other.volume);
        fill(&mut self.liquidity, other.liquidity);
        fill(&mut self.price_change_1h, other.price_change_1h);
        fill(&mut self.source, other.source);
    }

    /// Project the fields tracked for live updates.
    #[must_use]
    pub fn to_update(&self) -> UpdateRecord {
        UpdateRecord {
            address: self.address.clone(),
            price: self.price,
            volume: self.volume,
            price_change_1h: self.price_change_1h,
        }
    }
}

fn fill<T>(slot: &mut Option<T>, fallback: Option<T>) {
    if slot.is_none() {
        *slot = fallback;
    }
}

/// The merged, deduplicated quote list for one query at one moment.
pub type Snapshot = Vec<QuoteRecord>;

// =============================================================================
// Update Record
// =============================================================================

/// Changed-field projection of a quote, pushed to live subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// Token identity.
    #[serde(rename = "token_address")]
    pub address: TokenAddress,
    /// Current unit price.
    #[serde(
        rename = "price_sol",
        default,
        with = "rust_decimal::serde::float_option"
    )]
    pub price: Option<Decimal>,
    /// Current 24h volume.
    #[serde(
        rename = "volume_sol",
        default,
        with = "rust_decimal::serde::float_option"
    )]
    pub volume: Option<Decimal>,
    /// Current 1h price change percentage.
    #[serde(
        rename = "price_1hr_change",
        default,
        with = "rust_decimal::serde::float_option"
    )]
    pub price_change_1h: Option<Decimal>,
}

// =============================================================================
// Tests
// =============================================================================
