//! Retry Policy
//!
//! Linear backoff with jitter for upstream HTTP requests. The n-th retry
//! waits `base_delay * n`, capped at `max_delay`, then randomized by
//! `±jitter_factor`.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::UpstreamSettings;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay before any single retry.
    pub max_delay: Duration,
    /// Jitter factor as a fraction (e.g., 0.1 = ±10% randomization).
    pub jitter_factor: f64,
    /// Retries allowed after the initial attempt.
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            jitter_factor: 0.1,
            max_retries: 3,
        }
    }
}

impl RetryConfig {
    /// Create configuration from `UpstreamSettings`.
    #[must_use]
    pub const fn from_settings(settings: &UpstreamSettings) -> Self {
        Self {
            base_delay: settings.retry_base_delay,
            max_delay: settings.retry_max_delay,
            jitter_factor: 0.1,
            max_retries: settings.max_retries,
        }
    }

    /// Configuration without jitter, for deterministic delays.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }
}

/// Per-request retry state.
///
/// ```rust
/// use std::time::Duration;
/// use token_aggregator::infrastructure::upstream::{RetryConfig, RetryPolicy};
///
/// let mut policy = RetryPolicy::new(RetryConfig::default().without_jitter());
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(2)));
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(3)));
/// assert_eq!(policy.next_delay(), None);
/// ```
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    retries: u32,
}

impl RetryPolicy {
    /// Create a fresh policy.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config, retries: 0 }
    }

    /// Delay before the next retry, or `None` once the budget is spent.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.retries >= self.config.max_retries {
            return None;
        }
        self.retries += 1;

        let linear = self
            .config
            .base_delay
            .saturating_mul(self.retries)
            .min(self.config.max_delay);

        Some(self.apply_jitter(linear))
    }

    /// Clamp a server-provided delay (e.g. `Retry-After`) to the configured maximum.
    #[must_use]
    pub fn clamp(&self, delay: Duration) -> Duration {
        delay.min(self.config.max_delay)
    }

    /// Retries taken so far.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 || duration.is_zero() {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}
