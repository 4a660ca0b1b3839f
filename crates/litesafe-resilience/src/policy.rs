// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry policy and per-execution retry state.

use std::time::Duration;

/// Default number of attempts for a single command.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default delay after the first failed attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(50);
/// Default ceiling for any single backoff sleep.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(2);
/// Default growth factor between consecutive delays.
pub const DEFAULT_MULTIPLIER: u32 = 2;

/// Bounded exponential backoff.
///
/// The delay after failed attempt `n` (1-based) is
/// `min(base_delay * multiplier^(n-1), max_delay)`, so delays never shrink
/// from one attempt to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and first delay.
    ///
    /// `max_attempts` is clamped to at least 1. The delay ceiling defaults
    /// to the larger of `base_delay` and [`DEFAULT_MAX_DELAY`].
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: base_delay.max(DEFAULT_MAX_DELAY),
            multiplier: DEFAULT_MULTIPLIER,
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Set the ceiling for a single backoff sleep. Never below `base_delay`.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay.max(self.base_delay);
        self
    }

    /// Set the growth factor. A multiplier of 1 gives a constant delay.
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Delay to sleep after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.saturating_pow(exponent);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Worst-case total sleep across a full attempt budget.
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.delay_for(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Progress of one retried execution. Created per execution and discarded
/// on success or final failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState<K> {
    /// Attempts made so far.
    pub attempt: u32,
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Class of the most recent failure, if any.
    pub last_error: Option<K>,
}

impl<K> RetryState<K> {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 0,
            max_attempts: policy.max_attempts(),
            base_delay: policy.base_delay(),
            last_error: None,
        }
    }

    /// Whether the attempt budget has been spent.
    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_until_ceiling() {
        let policy = RetryPolicy::new(6, Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(50));
        let delays: Vec<_> = (1..=5).map(|n| policy.delay_for(n)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(40),
                Duration::from_millis(50),
                Duration::from_millis(50),
            ]
        );
    }

    #[test]
    fn delays_never_decrease() {
        let policy = RetryPolicy::new(100, Duration::from_millis(3)).with_multiplier(3);
        let mut previous = Duration::ZERO;
        for attempt in 1..200 {
            let delay = policy.delay_for(attempt);
            assert!(delay >= previous, "attempt {attempt}: {delay:?} < {previous:?}");
            previous = delay;
        }
    }

    #[test]
    fn huge_attempt_numbers_saturate_at_ceiling() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(u32::MAX), policy.max_delay());
    }

    #[test]
    fn zero_attempts_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.total_backoff(), Duration::ZERO);
    }

    #[test]
    fn multiplier_one_gives_constant_delay() {
        let policy = RetryPolicy::new(4, Duration::from_millis(25)).with_multiplier(0);
        assert_eq!(policy.multiplier(), 1);
        assert_eq!(policy.total_backoff(), Duration::from_millis(75));
    }

    #[test]
    fn state_tracks_budget() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let mut state: RetryState<&str> = RetryState::new(&policy);
        assert!(!state.exhausted());
        state.attempt = 2;
        state.last_error = Some("busy");
        assert!(state.exhausted());
    }
}
