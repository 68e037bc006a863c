//! Reconnect backoff

use std::time::Duration;

use contracts::FirehoseConfig;

pub const DEFAULT_MIN_RETRY_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 1000;

/// Exponential backoff between a floor and a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_delay: DEFAULT_MIN_RETRY_DELAY,
            max_delay: DEFAULT_MAX_RETRY_DELAY,
            max_retries: DEFAULT_MAX_RETRY_COUNT,
        }
    }
}

impl RetryPolicy {
    /// Policy from config; unset values keep the defaults.
    pub fn from_config(config: &FirehoseConfig) -> Self {
        let defaults = Self::default();
        let min_delay = config.min_retry_delay().unwrap_or(defaults.min_delay);
        let max_delay = config
            .max_retry_delay()
            .unwrap_or(defaults.max_delay)
            .max(min_delay);

        Self {
            min_delay,
            max_delay,
            max_retries: config.max_retry_count().unwrap_or(defaults.max_retries),
        }
    }

    /// Delay before reconnect attempt `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.min_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts > self.max_retries
    }
}
