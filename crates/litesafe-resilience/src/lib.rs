// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry primitives for the Litesafe store safety layer.
//!
//! A [`RetryPolicy`] describes how many times and how far apart an operation
//! may be attempted. A [`Retrier`] executes async operations under a policy,
//! retrying only errors that [`Classify`] marks as transient, and honouring
//! an optional [`CancellationToken`](tokio_util::sync::CancellationToken)
//! during backoff sleeps.

pub mod policy;
pub mod retry;

pub use policy::{RetryPolicy, RetryState};
pub use retry::{Classify, RetryError, Retrier};
