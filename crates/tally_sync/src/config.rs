//! Configuration for the sync engine.

use std::time::Duration;
use tally_core::OwnerId;

/// Configuration for a [`crate::Synchronizer`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// The authenticated owner all sync state is scoped to.
    pub owner: OwnerId,
    /// Maximum rows fetched per table in one pull.
    pub pull_batch_size: u32,
    /// Retry behavior for `push_changes_with_retry`.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a configuration for the given owner.
    #[must_use]
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            pull_batch_size: 500,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the pull batch size.
    #[must_use]
    pub fn with_pull_batch_size(mut self, size: u32) -> Self {
        self.pull_batch_size = size;
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts.
    pub max_attempts: u32,
    /// Initial delay between attempts.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a retry configuration with the given attempt budget.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Calculates the delay for a given attempt (0-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% jitter
            let jitter = delay_secs * 0.25 * subsec_jitter();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Cheap pseudo-random jitter in [0, 1) without an RNG dependency.
fn subsec_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let owner = OwnerId::new();
        let config = SyncConfig::new(owner)
            .with_pull_batch_size(50)
            .with_retry(RetryConfig::no_retry());

        assert_eq!(config.owner, owner);
        assert_eq!(config.pull_batch_size, 50);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn first_attempt_has_no_delay() {
        let retry = RetryConfig::new(5);
        assert_eq!(retry.delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn backoff_grows_and_respects_max() {
        let retry = RetryConfig::new(10)
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(1));

        let d1 = retry.delay_for_attempt(1);
        assert!(d1 >= Duration::from_millis(100));
        assert!(d1 <= Duration::from_millis(150));

        let d2 = retry.delay_for_attempt(2);
        assert!(d2 >= Duration::from_millis(200));

        // 100ms * 2^9 would be far past the cap
        let d10 = retry.delay_for_attempt(10);
        assert!(d10 <= Duration::from_millis(1250));
    }
}
