//! Configuration for the sync engine.

use std::time::Duration;
use tablesync_protocol::TieBreak;

/// Configuration for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Retry configuration for pending operations.
    pub retry: RetryConfig,
    /// What to do with differing rows that cannot be ordered by timestamp.
    pub tie_break: TieBreak,
    /// Upper bound for each store's liveness probe.
    pub health_timeout: Duration,
    /// Every n-th pass of `synchronize_all` ignores the watermarks and
    /// compares whole tables; 0 disables full scans.
    pub full_scan_every: u32,
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            retry: RetryConfig::default(),
            tie_break: TieBreak::default(),
            health_timeout: Duration::from_secs(2),
            full_scan_every: 10,
        }
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the tie-break policy.
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Sets the liveness probe timeout.
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    /// Sets how often a pass ignores the watermarks.
    pub fn with_full_scan_every(mut self, passes: u32) -> Self {
        self.full_scan_every = passes;
        self
    }

    /// Returns true if the `pass`-th pass (counting from 1) is a full scan.
    pub fn is_full_scan(&self, pass: u64) -> bool {
        self.full_scan_every != 0 && pass % u64::from(self.full_scan_every) == 0
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retrying pending operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of apply attempts before an operation is discarded.
    pub max_attempts: u32,
    /// Delay unit; attempt `n` waits `base_delay * multiplier^n`.
    pub base_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates a retry configuration with the given attempt ceiling.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    /// Creates a configuration that discards an operation after its first
    /// failure.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
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

    /// Calculates the delay after the given failed attempt (1-based).
    ///
    /// With the defaults, attempt 1 waits 1000 ms and attempt 2 waits
    /// 2000 ms.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }

    /// Returns true if an operation that has made `attempts` attempts may
    /// be tried again.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_protocol::StoreId;

    #[test]
    fn engine_config_builder() {
        let config = EngineConfig::new()
            .with_retry(RetryConfig::new(5))
            .with_tie_break(TieBreak::Prefer(StoreId::A))
            .with_health_timeout(Duration::from_millis(300));

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.tie_break, TieBreak::Prefer(StoreId::A));
        assert_eq!(config.health_timeout, Duration::from_millis(300));
        assert_eq!(config.full_scan_every, 10);
    }

    #[test]
    fn full_scan_cadence() {
        let config = EngineConfig::new().with_full_scan_every(3);
        let full: Vec<u64> = (1..=9).filter(|&pass| config.is_full_scan(pass)).collect();
        assert_eq!(full, vec![3, 6, 9]);

        let never = EngineConfig::new().with_full_scan_every(0);
        assert!((1..=100).all(|pass| !never.is_full_scan(pass)));
    }

    #[test]
    fn default_backoff_doubles() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2000));
        assert!(config.allows_retry(2));
        assert!(!config.allows_retry(3));
    }

    #[test]
    fn backoff_is_capped() {
        let config = RetryConfig::new(50).with_max_delay(Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(40), Duration::from_secs(5));
    }

    #[test]
    fn no_retry_discards_after_first_failure() {
        let config = RetryConfig::no_retry();
        assert!(!config.allows_retry(1));
    }
}
