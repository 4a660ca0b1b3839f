// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection interceptors.
//!
//! An interceptor hooks two points in a connection's life: right after the
//! connection opens (to set per-connection defaults) and after every command
//! completes (to observe it). Interceptors are collected into an
//! [`InterceptorChain`], which keeps at most one interceptor per name and is
//! immutable once built.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use litesafe_core::TransactionMode;
use tracing::{debug, warn};

/// Per-connection defaults produced by the open hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Mode for transactions that do not name an operation kind.
    pub default_mode: TransactionMode,
    /// How long the engine waits on a file lock before reporting busy.
    pub busy_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            default_mode: TransactionMode::Immediate,
            busy_timeout: Duration::ZERO,
        }
    }
}

/// Result of one command, as seen by [`CommandInterceptor::on_complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    pub attempts: u32,
    pub succeeded: bool,
}

/// Hooks into connection open and command completion.
///
/// `on_open` runs on the connection's worker thread, so implementations must
/// be `Send + Sync`.
pub trait CommandInterceptor: Send + Sync + fmt::Debug {
    /// Unique name within a chain.
    fn name(&self) -> &'static str;

    fn on_open(
        &self,
        _conn: &rusqlite::Connection,
        _settings: &mut ConnectionSettings,
    ) -> rusqlite::Result<()> {
        Ok(())
    }

    fn on_complete(&self, _label: &str, _elapsed: Duration, _outcome: CommandOutcome) {}
}

/// Makes deferred the connection's default transaction mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferDeferredInterceptor;

impl CommandInterceptor for PreferDeferredInterceptor {
    fn name(&self) -> &'static str {
        "prefer-deferred"
    }

    fn on_open(
        &self,
        _conn: &rusqlite::Connection,
        settings: &mut ConnectionSettings,
    ) -> rusqlite::Result<()> {
        settings.default_mode = TransactionMode::Deferred;
        Ok(())
    }
}

/// Sets the engine's own busy wait.
#[derive(Debug, Clone, Copy)]
pub struct BusyTimeoutInterceptor {
    timeout: Duration,
}

impl BusyTimeoutInterceptor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandInterceptor for BusyTimeoutInterceptor {
    fn name(&self) -> &'static str {
        "busy-timeout"
    }

    fn on_open(
        &self,
        conn: &rusqlite::Connection,
        settings: &mut ConnectionSettings,
    ) -> rusqlite::Result<()> {
        conn.busy_timeout(self.timeout)?;
        settings.busy_timeout = self.timeout;
        Ok(())
    }
}

/// Logs command timings; commands at or above the threshold are logged at warn.
#[derive(Debug, Clone, Copy)]
pub struct ProfilingInterceptor {
    slow_threshold: Duration,
}

impl ProfilingInterceptor {
    pub fn new(slow_threshold: Duration) -> Self {
        Self { slow_threshold }
    }
}

impl CommandInterceptor for ProfilingInterceptor {
    fn name(&self) -> &'static str {
        "profiling"
    }

    fn on_complete(&self, label: &str, elapsed: Duration, outcome: CommandOutcome) {
        let elapsed_ms = elapsed.as_millis() as u64;
        if elapsed >= self.slow_threshold {
            warn!(
                command = label,
                elapsed_ms,
                attempts = outcome.attempts,
                succeeded = outcome.succeeded,
                "slow command"
            );
        } else {
            debug!(
                command = label,
                elapsed_ms,
                attempts = outcome.attempts,
                succeeded = outcome.succeeded,
                "command completed"
            );
        }
    }
}

/// Ordered, de-duplicated interceptors. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct InterceptorChain {
    interceptors: Arc<[Arc<dyn CommandInterceptor>]>,
}

impl InterceptorChain {
    pub fn builder() -> InterceptorChainBuilder {
        InterceptorChainBuilder::default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.interceptors.iter().any(|i| i.name() == name)
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run every open hook in order, stopping at the first failure.
    pub fn apply_open(
        &self,
        conn: &rusqlite::Connection,
        settings: &mut ConnectionSettings,
    ) -> rusqlite::Result<()> {
        for interceptor in self.interceptors.iter() {
            interceptor.on_open(conn, settings)?;
        }
        Ok(())
    }

    pub fn notify_complete(&self, label: &str, elapsed: Duration, outcome: CommandOutcome) {
        for interceptor in self.interceptors.iter() {
            interceptor.on_complete(label, elapsed, outcome);
        }
    }
}

#[derive(Debug, Default)]
pub struct InterceptorChainBuilder {
    interceptors: Vec<Arc<dyn CommandInterceptor>>,
}

impl InterceptorChainBuilder {
    /// Append `interceptor` unless one with the same name is already present.
    pub fn try_add(mut self, interceptor: impl CommandInterceptor + 'static) -> Self {
        self.try_add_shared(Arc::new(interceptor));
        self
    }

    /// Like [`try_add`](Self::try_add) for an already shared interceptor.
    /// Returns whether it was added.
    pub fn try_add_shared(&mut self, interceptor: Arc<dyn CommandInterceptor>) -> bool {
        if self.interceptors.iter().any(|i| i.name() == interceptor.name()) {
            debug!(name = interceptor.name(), "interceptor already registered, skipping");
            return false;
        }
        self.interceptors.push(interceptor);
        true
    }

    /// The collected interceptors, for merging into another builder.
    pub fn into_shared(self) -> Vec<Arc<dyn CommandInterceptor>> {
        self.interceptors
    }

    pub fn build(self) -> InterceptorChain {
        InterceptorChain {
            interceptors: self.interceptors.into(),
        }
    }
}
