//! Aggregator Configuration Settings
//!
//! Configuration types for the aggregator service, loaded from environment
//! variables. Unparseable values fall back to their defaults; values that
//! parse but make no sense together are rejected.

use std::num::NonZeroUsize;
use std::time::Duration;

/// Default DexScreener search endpoint.
pub const DEFAULT_DEXSCREENER_URL: &str = "https://api.dexscreener.com/latest/dex/search";

/// Default Jupiter token search endpoint.
pub const DEFAULT_JUPITER_URL: &str = "https://lite-api.jup.ag/tokens/v2/search";

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Port serving the REST API, WebSocket, health and metrics routes.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Snapshot cache and poller timing.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Lifetime of a cached snapshot.
    pub ttl: Duration,
    /// Interval between poll cycles. Must be shorter than `ttl`.
    pub poll_interval: Duration,
    /// Search term refreshed by the poller.
    pub default_query: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            poll_interval: Duration::from_secs(15),
            default_query: "SOL".to_string(),
        }
    }
}

/// Query endpoint paging limits.
#[derive(Debug, Clone)]
pub struct QuerySettings {
    /// Page size when the client sends none.
    pub default_page_size: NonZeroUsize,
    /// Upper bound applied to client page sizes.
    pub max_page_size: NonZeroUsize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            default_page_size: NonZeroUsize::new(20).unwrap_or(NonZeroUsize::MIN),
            max_page_size: NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

/// Upstream API endpoints and retry policy.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// DexScreener search endpoint.
    pub dexscreener_url: String,
    /// Jupiter token search endpoint.
    pub jupiter_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry; later retries scale linearly.
    pub retry_base_delay: Duration,
    /// Upper bound on a single retry delay.
    pub retry_max_delay: Duration,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            dexscreener_url: DEFAULT_DEXSCREENER_URL.to_string(),
            jupiter_url: DEFAULT_JUPITER_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(1000),
            retry_max_delay: Duration::from_millis(5000),
        }
    }
}

/// Broadcast channel settings.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Capacity of the update channel, in batches.
    pub updates_capacity: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            updates_capacity: 1024,
        }
    }
}

/// Complete aggregator configuration.
#[derive(Debug, Clone, Default)]
pub struct AggregatorConfig {
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Cache and poller timing.
    pub cache: CacheSettings,
    /// Query endpoint limits.
    pub query: QuerySettings,
    /// Upstream API settings.
    pub upstream: UpstreamSettings,
    /// Broadcast channel settings.
    pub broadcast: BroadcastSettings,
}

impl AggregatorConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is empty where one is required, or if the
    /// resulting settings are inconsistent (see [`Self::validate`]).
    pub fn from_env() -> Result<Self, ConfigError> {
        let server = ServerSettings {
            port: parse_env("PORT", ServerSettings::default().port),
        };

        let cache_defaults = CacheSettings::default();
        let cache = CacheSettings {
            ttl: parse_env_duration_secs("AGGREGATOR_CACHE_TTL_SECS", cache_defaults.ttl),
            poll_interval: parse_env_duration_secs(
                "AGGREGATOR_POLL_INTERVAL_SECS",
                cache_defaults.poll_interval,
            ),
            default_query: parse_env_string(
                "AGGREGATOR_DEFAULT_QUERY",
                cache_defaults.default_query,
            )?,
        };

        let query_defaults = QuerySettings::default();
        let query = QuerySettings {
            default_page_size: parse_env(
                "AGGREGATOR_DEFAULT_PAGE_SIZE",
                query_defaults.default_page_size,
            ),
            max_page_size: parse_env("AGGREGATOR_MAX_PAGE_SIZE", query_defaults.max_page_size),
        };

        let upstream_defaults = UpstreamSettings::default();
        let upstream = UpstreamSettings {
            dexscreener_url: parse_env_string(
                "AGGREGATOR_DEXSCREENER_URL",
                upstream_defaults.dexscreener_url,
            )?,
            jupiter_url: parse_env_string("AGGREGATOR_JUPITER_URL", upstream_defaults.jupiter_url)?,
            request_timeout: parse_env_duration_secs(
                "AGGREGATOR_HTTP_TIMEOUT_SECS",
                upstream_defaults.request_timeout,
            ),
            max_retries: parse_env("AGGREGATOR_MAX_RETRIES", upstream_defaults.max_retries),
            retry_base_delay: parse_env_duration_millis(
                "AGGREGATOR_RETRY_BASE_DELAY_MS",
                upstream_defaults.retry_base_delay,
            ),
            retry_max_delay: parse_env_duration_millis(
                "AGGREGATOR_RETRY_MAX_DELAY_MS",
                upstream_defaults.retry_max_delay,
            ),
        };

        let broadcast = BroadcastSettings {
            updates_capacity: parse_env(
                "AGGREGATOR_UPDATES_CAPACITY",
                BroadcastSettings::default().updates_capacity,
            ),
        };

        let config = Self {
            server,
            cache,
            query,
            upstream,
            broadcast,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// - the poll interval is not strictly shorter than the cache TTL
    /// - the default page size exceeds the maximum page size
    /// - the update channel has zero capacity
    /// - the request timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "AGGREGATOR_POLL_INTERVAL_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.cache.poll_interval >= self.cache.ttl {
            return Err(ConfigError::PollIntervalNotBelowTtl {
                poll_interval: self.cache.poll_interval,
                ttl: self.cache.ttl,
            });
        }

        if self.query.default_page_size > self.query.max_page_size {
            return Err(ConfigError::InvalidValue {
                key: "AGGREGATOR_DEFAULT_PAGE_SIZE",
                reason: format!(
                    "{} exceeds AGGREGATOR_MAX_PAGE_SIZE ({})",
                    self.query.default_page_size, self.query.max_page_size
                ),
            });
        }

        if self.broadcast.updates_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "AGGREGATOR_UPDATES_CAPACITY",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.upstream.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "AGGREGATOR_HTTP_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable parsed but is out of range.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// Snapshots would expire between poll cycles.
    #[error("poll interval ({poll_interval:?}) must be shorter than cache TTL ({ttl:?})")]
    PollIntervalNotBelowTtl {
        /// Configured poll interval.
        poll_interval: Duration,
        /// Configured cache TTL.
        ttl: Duration,
    },
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_env_string(key: &str, default: String) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(key.to_string())),
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) => Ok(default),
    }
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AggregatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.cache.ttl, Duration::from_secs(30));
        assert_eq!(config.cache.poll_interval, Duration::from_secs(15));
        assert_eq!(config.cache.default_query, "SOL");
        assert_eq!(config.query.default_page_size.get(), 20);
        assert_eq!(config.query.max_page_size.get(), 100);
    }

    #[test]
    fn upstream_defaults() {
        let settings = UpstreamSettings::default();
        assert_eq!(settings.dexscreener_url, DEFAULT_DEXSCREENER_URL);
        assert_eq!(settings.jupiter_url, DEFAULT_JUPITER_URL);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.retry_base_delay, Duration::from_secs(1));
        assert_eq!(settings.retry_max_delay, Duration::from_secs(5));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn poll_interval_equal_to_ttl_is_rejected() {
        let mut config = AggregatorConfig::default();
        config.cache.poll_interval = config.cache.ttl;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::PollIntervalNotBelowTtl { .. })
        ));
    }

    #[test]
    fn poll_interval_above_ttl_is_rejected() {
        let mut config = AggregatorConfig::default();
        config.cache.poll_interval = Duration::from_secs(60);

        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut config = AggregatorConfig::default();
        config.cache.poll_interval = Duration::ZERO;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                key: "AGGREGATOR_POLL_INTERVAL_SECS",
                ..
            })
        ));
    }

    #[test]
    fn default_page_size_above_max_is_rejected() {
        let mut config = AggregatorConfig::default();
        config.query.default_page_size = NonZeroUsize::new(500).unwrap();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                key: "AGGREGATOR_DEFAULT_PAGE_SIZE",
                ..
            })
        ));
    }

    #[test]
    fn zero_updates_capacity_is_rejected() {
        let mut config = AggregatorConfig::default();
        config.broadcast.updates_capacity = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn error_messages_name_the_setting() {
        let err = ConfigError::PollIntervalNotBelowTtl {
            poll_interval: Duration::from_secs(30),
            ttl: Duration::from_secs(30),
        };
        assert!(err.to_string().contains("shorter than cache TTL"));

        let err = ConfigError::EmptyValue("AGGREGATOR_DEFAULT_QUERY".to_string());
        assert!(err.to_string().contains("AGGREGATOR_DEFAULT_QUERY"));
    }

    #[test]
    fn unset_variable_uses_default() {
        assert_eq!(parse_env("AGGREGATOR_TEST_UNSET_VARIABLE", 7u32), 7);
        assert_eq!(
            parse_env_duration_secs("AGGREGATOR_TEST_UNSET_VARIABLE", Duration::from_secs(3)),
            Duration::from_secs(3)
        );
        assert_eq!(
            parse_env_string("AGGREGATOR_TEST_UNSET_VARIABLE", "SOL".to_string()).unwrap(),
            "SOL"
        );
    }
}
