//! Jupiter token search adapter.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{UpstreamHttpClient, decode_items, lenient_decimal, non_blank};
use crate::application::ports::QuoteSource;
use crate::domain::quote::QuoteRecord;
use crate::infrastructure::metrics::{self, UpstreamOutcome};

const SOURCE: &str = "jupiter";

/// Label stamped on every record from this source.
const SOURCE_LABEL: &str = "Jupiter";

/// Quote source backed by the Jupiter token search API.
///
/// Jupiter reports identity, price and market cap only. Volume, liquidity
/// and price change stay absent so other sources can fill them in.
#[derive(Debug, Clone)]
pub struct JupiterSource {
    client: UpstreamHttpClient,
    url: String,
}

impl JupiterSource {
    /// Create a source querying `url` (without the `query` parameter).
    #[must_use]
    pub fn new(client: UpstreamHttpClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl QuoteSource for JupiterSource {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, query: &str) -> Vec<QuoteRecord> {
        match self
            .client
            .get_json::<Vec<serde_json::Value>>(SOURCE, &self.url, &[("query", query)])
            .await
        {
            Ok(items) => {
                let quotes: Vec<QuoteRecord> = decode_items::<Token>(SOURCE, items)
                    .into_iter()
                    .filter_map(Token::into_quote)
                    .collect();
                metrics::record_upstream_request(SOURCE, UpstreamOutcome::Success);
                metrics::record_source_records(SOURCE, quotes.len());
                tracing::debug!(query, records = quotes.len(), "Fetched Jupiter tokens");
                quotes
            }
            Err(e) => {
                metrics::record_upstream_request(SOURCE, UpstreamOutcome::Failure);
                metrics::record_source_records(SOURCE, 0);
                tracing::warn!(query, error = %e, "Jupiter request failed");
                Vec::new()
            }
        }
    }
}

// Older API versions use `address`/`price`/`marketCap`, the current one
// `id`/`usdPrice`/`mcap`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Token {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    usd_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    market_cap: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    mcap: Option<Decimal>,
}

impl Token {
    fn into_quote(self) -> Option<QuoteRecord> {
        let address = non_blank(self.address).or_else(|| non_blank(self.id))?;

        Some(QuoteRecord {
            name: non_blank(self.name),
            ticker: non_blank(self.symbol),
            price: self.price.or(self.usd_price),
            market_cap: self.market_cap.or(self.mcap),
            source: Some(SOURCE_LABEL.to_string()),
            ..QuoteRecord::new(address.trim())
        })
    }
}
