// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `sqlite` provider: one place that wires the guard, interceptors,
//! retry policy, lock manager and creator together.

use std::time::Duration;

use litesafe_config::LitesafeConfig;
use litesafe_core::{JournalMode, LitesafeError, PROVIDER_NAME};
use litesafe_resilience::RetryPolicy;
use tokio_util::sync::CancellationToken;

use crate::connection_string::ConnectionDescriptor;
use crate::creator::DatabaseCreator;
use crate::database::Database;
use crate::guard::{ConnectionGuard, SafeDescriptor};
use crate::interceptor::{
    BusyTimeoutInterceptor, CommandInterceptor, InterceptorChain, InterceptorChainBuilder,
    PreferDeferredInterceptor, ProfilingInterceptor,
};
use crate::locking::{LockManager, DEFAULT_LOCK_TIMEOUT};
use crate::retry::RetryInterceptor;
use crate::write_mode::WriteModeSelector;

/// Default engine busy wait per statement.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(100);

/// Opens guarded, retrying connections to SQLite stores.
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    guard: ConnectionGuard,
    selector: WriteModeSelector,
    interceptors: InterceptorChain,
    policy: RetryPolicy,
    lock_timeout: Duration,
    journal_mode: JournalMode,
    cancel: Option<CancellationToken>,
}

impl Default for SqliteProvider {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SqliteProvider {
    pub fn builder() -> SqliteProviderBuilder {
        SqliteProviderBuilder::default()
    }

    /// Build a provider from the `[database]`, `[retry]`, `[lock]` and
    /// `[profiling]` sections.
    pub fn from_config(config: &LitesafeConfig) -> Self {
        Self::builder_from_config(config).build()
    }

    /// A builder preloaded from configuration, for adding a cancellation
    /// token or custom interceptors before building.
    pub fn builder_from_config(config: &LitesafeConfig) -> SqliteProviderBuilder {
        let retry = &config.retry;
        // A zero base delay would spin; unvalidated configs get a 1ms floor.
        let base_delay = Duration::from_millis(retry.base_delay_ms.max(1));
        let policy = RetryPolicy::new(retry.max_attempts, base_delay)
            .with_max_delay(Duration::from_millis(retry.max_delay_ms))
            .with_multiplier(retry.multiplier);

        let mut builder = Self::builder()
            .allow_create(config.database.allow_create)
            .prefer_deferred(config.database.prefer_deferred)
            .busy_timeout(Duration::from_millis(config.database.busy_timeout_ms))
            .journal_mode(config.database.journal_mode)
            .retry_policy(policy)
            .lock_timeout(Duration::from_millis(config.lock.default_timeout_ms));
        if config.profiling.enabled {
            builder = builder.profiling(Duration::from_millis(config.profiling.slow_command_ms));
        }
        builder
    }

    pub fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    pub fn guard(&self) -> ConnectionGuard {
        self.guard
    }

    pub fn selector(&self) -> WriteModeSelector {
        self.selector
    }

    pub fn interceptors(&self) -> &InterceptorChain {
        &self.interceptors
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Parse and guard `conn_str` for this provider.
    pub fn prepare(&self, conn_str: &str) -> Result<SafeDescriptor, LitesafeError> {
        let descriptor = ConnectionDescriptor::parse(conn_str, PROVIDER_NAME)?;
        Ok(self.guard.validate(descriptor))
    }

    /// Open a guarded descriptor. Descriptors for other providers are refused.
    pub async fn open(&self, descriptor: SafeDescriptor) -> Result<Database, LitesafeError> {
        if !descriptor
            .provider_name
            .trim()
            .eq_ignore_ascii_case(PROVIDER_NAME)
        {
            return Err(LitesafeError::Config(format!(
                "provider `{}` is not handled by `{PROVIDER_NAME}`",
                descriptor.provider_name
            )));
        }
        let mut retry = RetryInterceptor::new(self.policy.clone());
        if let Some(token) = &self.cancel {
            retry = retry.with_cancellation(token.clone());
        }
        Database::open(descriptor, self.interceptors.clone(), retry, self.selector).await
    }

    /// [`prepare`](Self::prepare) then [`open`](Self::open).
    pub async fn open_str(&self, conn_str: &str) -> Result<Database, LitesafeError> {
        let descriptor = self.prepare(conn_str)?;
        self.open(descriptor).await
    }

    pub fn creator(&self) -> DatabaseCreator {
        DatabaseCreator::new(self.journal_mode)
    }

    /// A lock manager on `db` using this provider's default lock timeout.
    pub async fn lock_manager(&self, db: &Database) -> Result<LockManager, LitesafeError> {
        Ok(LockManager::new(db.clone())
            .await?
            .with_default_timeout(self.lock_timeout))
    }
}

#[derive(Debug)]
pub struct SqliteProviderBuilder {
    allow_create: bool,
    prefer_deferred: bool,
    busy_timeout: Duration,
    profiling: Option<Duration>,
    policy: RetryPolicy,
    lock_timeout: Duration,
    journal_mode: JournalMode,
    cancel: Option<CancellationToken>,
    extra: InterceptorChainBuilder,
}

impl Default for SqliteProviderBuilder {
    fn default() -> Self {
        Self {
            allow_create: false,
            prefer_deferred: true,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            profiling: None,
            policy: RetryPolicy::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            journal_mode: JournalMode::default(),
            cancel: None,
            extra: InterceptorChain::builder(),
        }
    }
}

impl SqliteProviderBuilder {
    pub fn allow_create(mut self, allow: bool) -> Self {
        self.allow_create = allow;
        self
    }

    pub fn prefer_deferred(mut self, prefer: bool) -> Self {
        self.prefer_deferred = prefer;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Log command timings, warning at or above `slow_threshold`.
    pub fn profiling(mut self, slow_threshold: Duration) -> Self {
        self.profiling = Some(slow_threshold);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    /// Stop retry backoff on every opened connection once `token` fires.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Add a custom interceptor after the built-in ones.
    pub fn interceptor(mut self, interceptor: impl CommandInterceptor + 'static) -> Self {
        self.extra = self.extra.try_add(interceptor);
        self
    }

    pub fn build(self) -> SqliteProvider {
        let mut chain = InterceptorChain::builder();
        if self.prefer_deferred {
            chain = chain.try_add(PreferDeferredInterceptor);
        }
        chain = chain.try_add(BusyTimeoutInterceptor::new(self.busy_timeout));
        if let Some(threshold) = self.profiling {
            chain = chain.try_add(ProfilingInterceptor::new(threshold));
        }
        for interceptor in self.extra.into_shared() {
            chain.try_add_shared(interceptor);
        }

        SqliteProvider {
            guard: if self.allow_create {
                ConnectionGuard::allowing_create()
            } else {
                ConnectionGuard::new()
            },
            selector: WriteModeSelector::new(self.prefer_deferred),
            interceptors: chain.build(),
            policy: self.policy,
            lock_timeout: self.lock_timeout,
            journal_mode: self.journal_mode,
            cancel: self.cancel,
        }
    }
}
