//! Configuration for the sync session.

use std::time::Duration;

/// Configuration for a sync session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval between background poll cycles.
    pub poll_interval: Duration,
    /// Maximum operations sent in one commit request.
    pub max_ops_per_commit: usize,
    /// Retry configuration.
    pub retry: RetryConfig,
}

impl SessionConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_ops_per_commit: 100,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the background poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the maximum operations per commit request.
    pub fn with_max_ops_per_commit(mut self, max: usize) -> Self {
        self.max_ops_per_commit = max;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry backoff after failed exchanges.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound on the delay.
    pub max_delay: Duration,
    /// Multiplier applied per consecutive failure.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates a retry configuration with the given initial delay.
    pub fn new(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    /// Disables backoff entirely.
    pub fn no_backoff() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay before the next attempt after `failures` consecutive failures.
    pub fn delay_for_failures(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let base = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(failures.saturating_sub(1) as i32);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}
