//! Retry policy for resource downloads.

use std::time::Duration;

/// Linear backoff: the k-th failed attempt (0-based) waits `base_delay * (k + 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before the attempt that follows failed attempt `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.saturating_add(1))
    }

    /// Whether another attempt is allowed after `attempt` failed.
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_linear_two_second_steps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_after(0), Duration::from_secs(2));
        assert_eq!(policy.delay_after(1), Duration::from_secs(4));
        assert_eq!(policy.delay_after(4), Duration::from_secs(10));
    }

    #[test]
    fn test_has_next() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        assert!(policy.has_next(0));
        assert!(policy.has_next(1));
        assert!(!policy.has_next(2));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.has_next(0));
    }
}
