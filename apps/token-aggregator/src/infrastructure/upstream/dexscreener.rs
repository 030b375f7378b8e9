//! DexScreener pair search adapter.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{UpstreamHttpClient, decode_items, lenient_decimal, non_blank};
use crate::application::ports::QuoteSource;
use crate::domain::quote::QuoteRecord;
use crate::infrastructure::metrics::{self, UpstreamOutcome};

const SOURCE: &str = "dexscreener";

/// Quote source backed by the DexScreener search API.
///
/// One record per trading pair; the base token is the quoted token. Prices
/// are taken in the pair's quote currency (`priceNative`) and liquidity is
/// converted from USD using that price.
#[derive(Debug, Clone)]
pub struct DexScreenerSource {
    client: UpstreamHttpClient,
    url: String,
}

impl DexScreenerSource {
    /// Create a source querying `url` (without the `q` parameter).
    #[must_use]
    pub fn new(client: UpstreamHttpClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl QuoteSource for DexScreenerSource {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, query: &str) -> Vec<QuoteRecord> {
        match self
            .client
            .get_json::<SearchResponse>(SOURCE, &self.url, &[("q", query)])
            .await
        {
            Ok(response) => {
                let quotes = normalize(response);
                metrics::record_upstream_request(SOURCE, UpstreamOutcome::Success);
                metrics::record_source_records(SOURCE, quotes.len());
                tracing::debug!(query, records = quotes.len(), "Fetched DexScreener pairs");
                quotes
            }
            Err(e) => {
                metrics::record_upstream_request(SOURCE, UpstreamOutcome::Failure);
                metrics::record_source_records(SOURCE, 0);
                tracing::warn!(query, error = %e, "DexScreener request failed");
                Vec::new()
            }
        }
    }
}

fn normalize(response: SearchResponse) -> Vec<QuoteRecord> {
    decode_items::<Pair>(SOURCE, response.pairs.unwrap_or_default())
        .into_iter()
        .filter_map(Pair::into_quote)
        .collect()
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    pairs: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pair {
    base_token: BaseToken,
    #[serde(default, deserialize_with = "lenient_decimal")]
    price_native: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    fdv: Option<Decimal>,
    #[serde(default)]
    volume: Option<Volume>,
    liquidity: Liquidity,
    #[serde(default)]
    price_change: Option<PriceChange>,
    #[serde(default)]
    dex_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BaseToken {
    address: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    #[serde(default, deserialize_with = "lenient_decimal")]
    h24: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct Liquidity {
    #[serde(default, deserialize_with = "lenient_decimal")]
    usd: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct PriceChange {
    #[serde(default, deserialize_with = "lenient_decimal")]
    h1: Option<Decimal>,
}

impl Pair {
    fn into_quote(self) -> Option<QuoteRecord> {
        let address = self.base_token.address.trim();
        if address.is_empty() {
            return None;
        }

        let liquidity = match (self.liquidity.usd, self.price_native) {
            (Some(usd), Some(price)) if !price.is_zero() => usd.checked_div(price),
            _ => None,
        };

        Some(QuoteRecord {
            name: non_blank(self.base_token.name),
            ticker: non_blank(self.base_token.symbol),
            price: self.price_native,
            market_cap: self.fdv,
            volume: self.volume.and_then(|v| v.h24),
            liquidity,
            price_change_1h: self.price_change.and_then(|p| p.h1),
            source: non_blank(self.dex_id),
            ..QuoteRecord::new(address)
        })
    }
}
