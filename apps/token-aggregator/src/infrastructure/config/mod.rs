//! Configuration Module
//!
//! Configuration loading for the aggregator service.

mod settings;

pub use settings::{
    AggregatorConfig, BroadcastSettings, CacheSettings, ConfigError, DEFAULT_DEXSCREENER_URL,
    DEFAULT_JUPITER_URL, QuerySettings, ServerSettings, UpstreamSettings,
};
