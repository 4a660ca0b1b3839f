// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry-with-backoff executor.
//!
//! Only errors whose [`Classify::is_transient`] returns `true` are retried.
//! Everything else is returned after the attempt that produced it.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::policy::{RetryPolicy, RetryState};

/// Separates retryable failures from failures that must surface immediately.
pub trait Classify {
    /// A small, copyable description of the failure recorded in [`RetryState`].
    type Kind: Copy + fmt::Debug + Send;

    fn kind(&self) -> Self::Kind;

    /// `true` if the same operation may succeed when attempted again.
    fn is_transient(&self) -> bool;
}

/// Why a retried execution gave up.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt in the budget failed transiently. Carries the last error.
    #[error("gave up after {attempts} attempt(s): {error}")]
    Exhausted { attempts: u32, error: E },

    /// The deadline passed while the operation was still failing transiently.
    #[error("deadline elapsed after {attempts} attempt(s): {error}")]
    DeadlineElapsed { attempts: u32, error: E },

    /// A non-transient failure. Never retried.
    #[error("failed on attempt {attempt}: {error}")]
    Fatal { attempt: u32, error: E },

    /// The cancellation token fired while waiting to retry. At least one
    /// attempt has always been made.
    #[error("cancelled after {attempts} attempt(s): {last}")]
    Cancelled { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    /// Number of attempts actually made.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. }
            | RetryError::DeadlineElapsed { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
            RetryError::Fatal { attempt, .. } => *attempt,
        }
    }

    /// The last underlying error.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { error, .. }
            | RetryError::DeadlineElapsed { error, .. }
            | RetryError::Fatal { error, .. }
            | RetryError::Cancelled { last: error, .. } => error,
        }
    }
}

/// Executes async operations under a [`RetryPolicy`].
///
/// Cheap to clone; clones share the cancellation token.
#[derive(Debug, Clone, Default)]
pub struct Retrier {
    policy: RetryPolicy,
    cancel: Option<CancellationToken>,
}

impl Retrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cancel: None,
        }
    }

    /// Abandon backoff sleeps once `token` is cancelled. Cancellation never
    /// prevents the first attempt, so work started after shutdown (such as
    /// releasing a lock) still runs once.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The same policy with no cancellation token.
    pub fn without_cancellation(mut self) -> Self {
        self.cancel = None;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// Run `op` until it succeeds, fails non-transiently, or the attempt
    /// budget is spent.
    pub async fn run<F, Fut, T, E>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let mut state = RetryState::new(&self.policy);

        loop {
            state.attempt += 1;
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_transient() => {
                    return Err(RetryError::Fatal {
                        attempt: state.attempt,
                        error,
                    });
                }
                Err(error) => error,
            };
            state.last_error = Some(error.kind());

            if state.exhausted() {
                warn!(
                    attempts = state.attempt,
                    kind = ?state.last_error,
                    error = %error,
                    "retry budget exhausted"
                );
                return Err(RetryError::Exhausted {
                    attempts: state.attempt,
                    error,
                });
            }

            let delay = self.policy.delay_for(state.attempt);
            debug!(
                attempt = state.attempt,
                max_attempts = state.max_attempts,
                kind = ?state.last_error,
                ?delay,
                "transient failure, backing off"
            );
            if !self.pause(delay).await {
                return Err(RetryError::Cancelled {
                    attempts: state.attempt,
                    last: error,
                });
            }
        }
    }

    /// Run `op` until it succeeds, fails non-transiently, or `deadline`
    /// passes. The attempt budget is ignored; delays follow the same policy
    /// and are cut short so the final attempt happens at the deadline.
    pub async fn run_until<F, Fut, T, E>(
        &self,
        deadline: Instant,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let mut state = RetryState::new(&self.policy);

        loop {
            state.attempt += 1;
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_transient() => {
                    return Err(RetryError::Fatal {
                        attempt: state.attempt,
                        error,
                    });
                }
                Err(error) => error,
            };
            state.last_error = Some(error.kind());

            let now = Instant::now();
            if now >= deadline {
                debug!(
                    attempts = state.attempt,
                    kind = ?state.last_error,
                    "deadline elapsed"
                );
                return Err(RetryError::DeadlineElapsed {
                    attempts: state.attempt,
                    error,
                });
            }

            let delay = self.policy.delay_for(state.attempt).min(deadline - now);
            debug!(
                attempt = state.attempt,
                kind = ?state.last_error,
                ?delay,
                "waiting before next attempt"
            );
            if !self.pause(delay).await {
                return Err(RetryError::Cancelled {
                    attempts: state.attempt,
                    last: error,
                });
            }
        }
    }

    /// Sleep for `delay`. Returns `false` if cancelled first.
    async fn pause(&self, delay: Duration) -> bool {
        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => false,
                _ = sleep(delay) => true,
            },
            None => {
                sleep(delay).await;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestError {
        Busy,
        Constraint,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                TestError::Busy => write!(f, "database is locked"),
                TestError::Constraint => write!(f, "UNIQUE constraint failed"),
            }
        }
    }

    impl Classify for TestError {
        type Kind = TestError;

        fn kind(&self) -> TestError {
            *self
        }

        fn is_transient(&self) -> bool {
            matches!(self, TestError::Busy)
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(80))
    }

    #[tokio::test(start_paused = true)]
    async fn always_transient_makes_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let retrier = Retrier::new(policy(4));

        let result: Result<(), _> = retrier
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Busy) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(RetryError::Exhausted { attempts, error }) => {
                assert_eq!(attempts, 4);
                assert_eq!(error, TestError::Busy);
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_error_attempted_once() {
        let calls = AtomicU32::new(0);
        let retrier = Retrier::new(policy(5));

        let result: Result<(), _> = retrier
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Constraint) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(RetryError::Fatal {
                attempt: 1,
                error: TestError::Constraint
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let retrier = Retrier::new(policy(5));

        let value = retrier
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(TestError::Busy)
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_sleeps_follow_policy() {
        let retrier = Retrier::new(policy(4));
        let started = Instant::now();

        let _: Result<(), _> = retrier.run(|| async { Err(TestError::Busy) }).await;

        // 10 + 20 + 40 ms of backoff between four attempts.
        assert_eq!(started.elapsed(), Duration::from_millis(70));
    }

    #[tokio::test(start_paused = true)]
    async fn run_until_stops_at_deadline() {
        let calls = AtomicU32::new(0);
        let retrier = Retrier::new(policy(2));
        let started = Instant::now();
        let deadline = started + Duration::from_millis(250);

        let result: Result<(), _> = retrier
            .run_until(deadline, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Busy) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::DeadlineElapsed { .. })));
        // Attempt budget of 2 is ignored; the deadline bounds the loop.
        assert!(calls.load(Ordering::SeqCst) > 2);
        assert_eq!(started.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn run_until_with_past_deadline_tries_once() {
        let calls = AtomicU32::new(0);
        let retrier = Retrier::new(policy(5));

        let result: Result<(), _> = retrier
            .run_until(Instant::now(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Busy) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_backoff() {
        let token = CancellationToken::new();
        let retrier = Retrier::new(
            RetryPolicy::new(10, Duration::from_secs(60)).with_max_delay(Duration::from_secs(60)),
        )
        .with_cancellation(token.clone());
        let calls = Arc::new(AtomicU32::new(0));

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                sleep(Duration::from_secs(1)).await;
                token.cancel();
            })
        };

        let counter = Arc::clone(&calls);
        let result: Result<(), _> = retrier
            .run(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Busy) }
            })
            .await;
        canceller.await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match result {
            Err(RetryError::Cancelled { attempts, last }) => {
                assert_eq!(attempts, 1);
                assert_eq!(last, TestError::Busy);
            }
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn already_cancelled_token_still_attempts_once() {
        let token = CancellationToken::new();
        token.cancel();
        let retrier = Retrier::new(policy(3)).with_cancellation(token);
        let calls = AtomicU32::new(0);

        let ok: Result<u32, RetryError<TestError>> = retrier
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(1) }
            })
            .await;
        assert_eq!(ok.unwrap(), 1);

        let failed: Result<(), _> = retrier
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Busy) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(
            failed,
            Err(RetryError::Cancelled {
                attempts: 1,
                last: TestError::Busy
            })
        ));
    }

    #[tokio::test]
    async fn already_cancelled_token_still_attempts_once_before_deadline() {
        let token = CancellationToken::new();
        token.cancel();
        let retrier = Retrier::new(policy(3)).with_cancellation(token);
        let calls = AtomicU32::new(0);

        let result: Result<&str, RetryError<TestError>> = retrier
            .run_until(Instant::now() + Duration::from_secs(5), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("released") }
            })
            .await;
        assert_eq!(result.unwrap(), "released");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
