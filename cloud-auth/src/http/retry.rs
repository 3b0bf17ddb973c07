//! Capped exponential backoff shared by the retry middleware and the
//! artifact fetcher.

use std::time::{Duration, SystemTime};

use reqwest_retry::{RetryDecision, RetryPolicy};

/// Delay doubles from `base_delay` per past retry, never exceeding
/// `max_delay`. The fetcher drives its own loop and only asks
/// [`delay_for`](Self::delay_for).
#[derive(Debug, Clone)]
pub struct RetryAfterPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryAfterPolicy {
    /// One second base delay, one minute cap.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay to wait after `n_past_retries` failed retries.
    pub fn delay_for(&self, n_past_retries: u32) -> Duration {
        let factor = 2_u32.saturating_pow(n_past_retries);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl RetryPolicy for RetryAfterPolicy {
    fn should_retry(&self, _request_start_time: SystemTime, n_past_retries: u32) -> RetryDecision {
        if n_past_retries < self.max_retries {
            RetryDecision::Retry {
                execute_after: SystemTime::now() + self.delay_for(n_past_retries),
            }
        } else {
            RetryDecision::DoNotRetry
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delay() {
        let policy = RetryAfterPolicy::new(3);

        assert_eq!(policy.delay_for(0).as_secs(), 1);
        assert_eq!(policy.delay_for(1).as_secs(), 2);
        assert_eq!(policy.delay_for(2).as_secs(), 4);
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryAfterPolicy::new(10).with_max_delay(Duration::from_secs(5));

        assert_eq!(policy.delay_for(10), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_base_delay_never_waits() {
        let policy = RetryAfterPolicy::new(3).with_base_delay(Duration::ZERO);

        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(5), Duration::ZERO);
    }

    #[test]
    fn test_stops_after_max_retries() {
        let policy = RetryAfterPolicy::new(2);

        assert!(matches!(
            policy.should_retry(SystemTime::now(), 1),
            RetryDecision::Retry { .. }
        ));
        assert!(matches!(
            policy.should_retry(SystemTime::now(), 2),
            RetryDecision::DoNotRetry
        ));
    }
}
