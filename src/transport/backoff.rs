//! Retry backoff policies for failed deliveries

use std::time::Duration;

/// Largest shift used for exponential growth (base × 2^10).
const MAX_BACKOFF_EXPONENT: u32 = 10;

/// How long to wait before the next send after a failure.
pub trait BackoffPolicy: Send + Sync + 'static {
    /// `consecutive_failures` is at least 1.
    fn delay(&self, consecutive_failures: u32) -> Duration;
}

/// Same delay after every failure.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff {
    pub delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BackoffPolicy for FixedBackoff {
    fn delay(&self, _consecutive_failures: u32) -> Duration {
        self.delay
    }
}

/// Doubling delay with a cap and random jitter.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
    pub jitter: Duration,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration, jitter: Duration) -> Self {
        Self { base, max, jitter }
    }

    /// Delay before jitter.
    pub fn raw_delay(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.base.saturating_mul(1u32 << exponent).min(self.max)
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, consecutive_failures: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            use rand::Rng;
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        } else {
            Duration::ZERO
        };
        self.raw_delay(consecutive_failures) + jitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_ignores_failure_count() {
        let policy = FixedBackoff::new(Duration::from_secs(5));
        assert_eq!(policy.delay(1), Duration::from_secs(5));
        assert_eq!(policy.delay(9), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_doubles_and_caps() {
        let policy = ExponentialBackoff::new(
            Duration::from_secs(5),
            Duration::from_secs(60),
            Duration::ZERO,
        );
        assert_eq!(policy.delay(1), Duration::from_secs(5));
        assert_eq!(policy.delay(2), Duration::from_secs(10));
        assert_eq!(policy.delay(3), Duration::from_secs(20));
        assert_eq!(policy.delay(4), Duration::from_secs(40));
        assert_eq!(policy.delay(5), Duration::from_secs(60));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_exponential_jitter_stays_in_range() {
        let policy = ExponentialBackoff::new(
            Duration::from_secs(1),
            Duration::from_secs(300),
            Duration::from_millis(500),
        );
        for _ in 0..100 {
            let d = policy.delay(1);
            assert!(d >= Duration::from_secs(1));
            assert!(d < Duration::from_millis(1500));
        }
    }
}
