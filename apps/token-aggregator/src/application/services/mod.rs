//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `QuoteAggregator`: Cache-aside snapshot aggregation across sources
//! - `TokenQueryService`: Filter, sort and paginate for the read path
//! - `QuotePoller`: Periodic refresh, diff and broadcast

mod aggregator;
mod poller;
mod query;

pub use aggregator::{CACHE_KEY_PREFIX, QuoteAggregator};
pub use poller::{PollerStatus, QuotePoller};
pub use query::{TokenQuery, TokenQueryService};
