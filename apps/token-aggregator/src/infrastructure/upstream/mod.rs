//! Upstream Quote Sources
//!
//! `QuoteSource` adapters for the public DEX APIs, plus the shared HTTP
//! client and retry policy they use.
//!
//! Each adapter decodes the response envelope strictly but every item
//! leniently: an item that cannot be read is dropped and the rest of the
//! payload is kept.

mod dexscreener;
mod http;
mod jupiter;
mod retry;

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

pub use dexscreener::DexScreenerSource;
pub use http::{UpstreamError, UpstreamHttpClient};
pub use jupiter::JupiterSource;
pub use retry::{RetryConfig, RetryPolicy};

/// Decode items one by one, keeping those that match `T`.
fn decode_items<T: serde::de::DeserializeOwned>(
    source: &'static str,
    items: Vec<serde_json::Value>,
) -> Vec<T> {
    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();

    if decoded.len() < total {
        tracing::debug!(
            source,
            dropped = total - decoded.len(),
            "Dropped malformed upstream records"
        );
    }
    decoded
}

/// Read a JSON number or numeric string as a decimal. Anything else,
/// including out-of-range values, becomes `None`.
fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(decimal_from_json))
}

fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Treat a blank string as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
