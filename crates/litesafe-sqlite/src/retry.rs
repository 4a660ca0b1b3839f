// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Busy-retry interceptor: every command attempt runs through here.

use std::future::Future;

use litesafe_core::LitesafeError;
use litesafe_resilience::{Retrier, RetryError, RetryPolicy};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::classify::AttemptError;

/// Retries busy/locked attempts under one shared [`RetryPolicy`].
///
/// The same policy drives command retry (bounded by attempts) and lock
/// acquisition (bounded by a deadline).
#[derive(Debug, Clone, Default)]
pub struct RetryInterceptor {
    retrier: Retrier,
}

impl RetryInterceptor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            retrier: Retrier::new(policy),
        }
    }

    /// Abandon backoff once `token` fires.
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        Self {
            retrier: self.retrier.with_cancellation(token),
        }
    }

    /// Full backoff regardless of any cancellation token. For cleanup that
    /// must finish during shutdown.
    pub fn without_cancellation(self) -> Self {
        Self {
            retrier: self.retrier.without_cancellation(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        self.retrier.policy()
    }

    pub fn retrier(&self) -> &Retrier {
        &self.retrier
    }

    /// Run `op` with attempt-bounded retry.
    pub async fn execute<F, Fut, T>(&self, op: F) -> Result<T, LitesafeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        self.retrier.run(op).await.map_err(map_retry_error)
    }

    /// Run `op` with deadline-bounded retry. The raw error is returned so the
    /// caller can describe a timeout in its own terms.
    pub async fn execute_until<F, Fut, T>(
        &self,
        deadline: Instant,
        op: F,
    ) -> Result<T, RetryError<AttemptError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        self.retrier.run_until(deadline, op).await
    }
}

/// Translate a retry outcome into the public error type.
pub fn map_retry_error(err: RetryError<AttemptError>) -> LitesafeError {
    match err {
        RetryError::Exhausted { attempts, error }
        | RetryError::DeadlineElapsed { attempts, error } => LitesafeError::TransientBusy {
            attempts,
            source: Box::new(error),
        },
        RetryError::Fatal { error, .. } => error.into(),
        RetryError::Cancelled { attempts, .. } => LitesafeError::Cancelled { attempts },
    }
}
