// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Litesafe store safety layer.

use std::time::Duration;

use thiserror::Error;

/// The primary error type returned by every Litesafe operation.
#[derive(Debug, Error)]
pub enum LitesafeError {
    /// Malformed connection descriptor or a store that cannot be opened as
    /// described (for example, a missing file opened without create access).
    #[error("configuration error: {0}")]
    Config(String),

    /// The store stayed busy or locked for every allowed attempt.
    #[error("store busy after {attempts} attempt(s): {source}")]
    TransientBusy {
        attempts: u32,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A named lock was not acquired before the timeout elapsed.
    #[error("timed out after {waited:?} waiting for lock `{resource}`{}", holder_suffix(.holder))]
    LockTimeout {
        resource: String,
        waited: Duration,
        holder: Option<String>,
    },

    /// Release was called with a handle this store does not recognise.
    #[error("invalid lock handle for `{resource}`: {reason}")]
    InvalidHandle { resource: String, reason: String },

    /// Logical store errors (constraint violation, SQL error, closed connection).
    /// These are never retried.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Schema migration failed.
    #[error("migration error: {source}")]
    Migration {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The caller cancelled a retry loop while it was backing off.
    #[error("operation cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    /// No provider is registered under the requested name.
    #[error("provider not registered: {name}")]
    ProviderNotFound { name: String },

    /// Caller-supplied input was rejected before reaching the store.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LitesafeError {
    /// Returns `true` for errors that a later attempt could plausibly clear.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LitesafeError::TransientBusy { .. } | LitesafeError::LockTimeout { .. }
        )
    }
}

fn holder_suffix(holder: &Option<String>) -> String {
    match holder {
        Some(owner) => format!(" (held by {owner})"),
        None => String::new(),
    }
}
