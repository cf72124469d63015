/**
 * Configuration constants for the status synchronization engine
 */
use super::errors::invalid_config_error;
use crate::error::Result;
use std::time::Duration;

/// Delay between cycles while the bridge is answering (milliseconds)
pub const DEFAULT_FAST_INTERVAL_MS: u64 = 3_000;

/// Delay between cycles once every endpoint keeps failing (milliseconds)
pub const DEFAULT_BACKOFF_INTERVAL_MS: u64 = 15_000;

/// Per-request timeout for a single endpoint fetch (milliseconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Consecutive all-endpoint failures before switching to the backoff interval
pub const DEFAULT_BACKOFF_THRESHOLD: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub fast_interval: Duration,
    pub backoff_interval: Duration,
    pub request_timeout: Duration,
    pub backoff_threshold: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fast_interval: Duration::from_millis(DEFAULT_FAST_INTERVAL_MS),
            backoff_interval: Duration::from_millis(DEFAULT_BACKOFF_INTERVAL_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            backoff_threshold: DEFAULT_BACKOFF_THRESHOLD,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn with_fast_interval(mut self, interval: Duration) -> Self {
        self.fast_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_backoff_interval(mut self, interval: Duration) -> Self {
        self.backoff_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_backoff_threshold(mut self, threshold: u32) -> Self {
        self.backoff_threshold = threshold;
        self
    }

    /// Check the intervals make sense together.
    ///
    /// # Errors
    ///
    /// Returns an error if an interval is zero, the backoff interval is
    /// shorter than the fast one, or the threshold is zero.
    pub fn validate(&self) -> Result<()> {
        if self.fast_interval.is_zero() {
            return Err(invalid_config_error("fast interval must be greater than 0"));
        }
        if self.request_timeout.is_zero() {
            return Err(invalid_config_error("request timeout must be greater than 0"));
        }
        if self.backoff_interval < self.fast_interval {
            return Err(invalid_config_error(
                "backoff interval must not be shorter than the fast interval",
            ));
        }
        if self.backoff_threshold == 0 {
            return Err(invalid_config_error("backoff threshold must be at least 1"));
        }
        Ok(())
    }
}

/// Validate configuration constants at compile time
const _: () = {
    assert!(DEFAULT_FAST_INTERVAL_MS > 0, "DEFAULT_FAST_INTERVAL_MS must be greater than 0");
    assert!(
        DEFAULT_BACKOFF_INTERVAL_MS >= DEFAULT_FAST_INTERVAL_MS,
        "DEFAULT_BACKOFF_INTERVAL_MS must not be shorter than DEFAULT_FAST_INTERVAL_MS"
    );
    assert!(DEFAULT_REQUEST_TIMEOUT_MS > 0, "DEFAULT_REQUEST_TIMEOUT_MS must be greater than 0");
    assert!(DEFAULT_BACKOFF_THRESHOLD > 0, "DEFAULT_BACKOFF_THRESHOLD must be greater than 0");
};
