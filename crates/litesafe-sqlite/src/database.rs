// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Guarded, retrying database handle.
//!
//! A [`Database`] wraps one `tokio-rusqlite` connection. Commands on it run on
//! the connection's single background thread in the order they were issued.
//! Every command goes through the [`RetryInterceptor`] and is reported to the
//! [`InterceptorChain`] when it completes.

use std::fmt;
use std::sync::Arc;

use litesafe_core::{LitesafeError, OperationKind, TransactionMode};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::classify::AttemptError;
use crate::guard::SafeDescriptor;
use crate::interceptor::{CommandOutcome, ConnectionSettings, InterceptorChain};
use crate::retry::RetryInterceptor;
use crate::write_mode::{to_behavior, WriteModeSelector};

/// A guarded connection to one store. Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    descriptor: Arc<SafeDescriptor>,
    settings: ConnectionSettings,
    interceptors: InterceptorChain,
    retry: RetryInterceptor,
    selector: WriteModeSelector,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.descriptor.path)
            .field("mode", &self.descriptor.mode)
            .field("settings", &self.settings)
            .field("interceptors", &self.interceptors.names())
            .finish()
    }
}

impl Database {
    /// Open the store described by `descriptor`.
    ///
    /// Open failures, including a missing file opened without create
    /// access, are [`LitesafeError::Config`].
    pub async fn open(
        descriptor: SafeDescriptor,
        interceptors: InterceptorChain,
        retry: RetryInterceptor,
        selector: WriteModeSelector,
    ) -> Result<Self, LitesafeError> {
        if !descriptor.is_configured() {
            return Err(LitesafeError::Config(
                "connection string has no data source".to_string(),
            ));
        }

        let path = descriptor.path.clone();
        let conn = tokio_rusqlite::Connection::open_with_flags(&path, descriptor.open_flags())
            .await
            .map_err(|e| {
                LitesafeError::Config(format!(
                    "cannot open store `{path}` with mode {}: {e}",
                    descriptor.mode
                ))
            })?;

        let chain = interceptors.clone();
        let foreign_keys = descriptor.foreign_keys;
        let timeout = descriptor.default_timeout;
        let recursive_triggers = descriptor.recursive_triggers;
        let settings = conn
            .call(move |c| {
                let mut settings = ConnectionSettings::default();
                chain.apply_open(c, &mut settings)?;
                // An explicit timeout in the connection string wins over the interceptor.
                if let Some(timeout) = timeout {
                    c.busy_timeout(timeout)?;
                    settings.busy_timeout = timeout;
                }
                if let Some(on) = foreign_keys {
                    c.pragma_update(None, "foreign_keys", on)?;
                }
                if let Some(on) = recursive_triggers {
                    c.pragma_update(None, "recursive_triggers", on)?;
                }
                Ok::<_, rusqlite::Error>(settings)
            })
            .await
            .map_err(|e| LitesafeError::Storage {
                source: Box::new(e),
            })?;

        info!(
            path = %descriptor.path,
            mode = %descriptor.mode,
            default_mode = %settings.default_mode,
            busy_timeout_ms = settings.busy_timeout.as_millis() as u64,
            "store opened"
        );

        Ok(Self {
            conn,
            descriptor: Arc::new(descriptor),
            settings,
            interceptors,
            retry,
            selector,
        })
    }

    /// A handle on the same connection whose retry backoff stops once
    /// `token` fires.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            retry: self.retry.clone().with_cancellation(token),
            ..self.clone()
        }
    }

    /// A handle on the same connection that ignores cancellation, used for
    /// lock release and shutdown checkpoints.
    pub fn without_cancellation(&self) -> Self {
        Self {
            retry: self.retry.clone().without_cancellation(),
            ..self.clone()
        }
    }

    pub fn path(&self) -> &str {
        &self.descriptor.path
    }

    pub fn descriptor(&self) -> &SafeDescriptor {
        &self.descriptor
    }

    pub fn settings(&self) -> ConnectionSettings {
        self.settings
    }

    pub fn selector(&self) -> WriteModeSelector {
        self.selector
    }

    pub fn retry(&self) -> &RetryInterceptor {
        &self.retry
    }

    pub fn interceptors(&self) -> &InterceptorChain {
        &self.interceptors
    }

    /// The raw connection. Commands issued here bypass retry and interceptors.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// One attempt of `f` on the worker thread, without retry.
    pub async fn attempt<F, T>(&self, f: F) -> Result<T, AttemptError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |c| Ok::<_, rusqlite::Error>(f(c)))
            .await
            .map_err(AttemptError::Connection)?
            .map_err(AttemptError::Sqlite)
    }

    /// Run `f` with busy retry. Success is reported only once `f` returned
    /// `Ok`, so a statement must be safe to run again after a busy failure.
    pub async fn call<F, T>(&self, label: &str, f: F) -> Result<T, LitesafeError>
    where
        F: Fn(&mut rusqlite::Connection) -> rusqlite::Result<T> + Send + Sync + 'static,
        T: Send + 'static,
    {
        let f = Arc::new(f);
        let started = Instant::now();
        let mut attempts = 0u32;

        let result = self
            .retry
            .execute(|| {
                attempts += 1;
                let f = Arc::clone(&f);
                self.attempt(move |c| (*f)(c))
            })
            .await;

        self.interceptors.notify_complete(
            label,
            started.elapsed(),
            CommandOutcome {
                attempts,
                succeeded: result.is_ok(),
            },
        );
        result
    }

    /// Run `f` inside a transaction whose mode the selector picks for `kind`.
    pub async fn transaction<F, T>(
        &self,
        kind: OperationKind,
        label: &str,
        f: F,
    ) -> Result<T, LitesafeError>
    where
        F: Fn(&rusqlite::Transaction<'_>) -> rusqlite::Result<T> + Send + Sync + 'static,
        T: Send + 'static,
    {
        self.run_transaction(self.selector.select_mode(kind), label, f)
            .await
    }

    /// Run `f` inside a transaction in the connection's default mode.
    pub async fn with_transaction<F, T>(&self, label: &str, f: F) -> Result<T, LitesafeError>
    where
        F: Fn(&rusqlite::Transaction<'_>) -> rusqlite::Result<T> + Send + Sync + 'static,
        T: Send + 'static,
    {
        self.run_transaction(self.settings.default_mode, label, f)
            .await
    }

    async fn run_transaction<F, T>(
        &self,
        mode: TransactionMode,
        label: &str,
        f: F,
    ) -> Result<T, LitesafeError>
    where
        F: Fn(&rusqlite::Transaction<'_>) -> rusqlite::Result<T> + Send + Sync + 'static,
        T: Send + 'static,
    {
        debug!(command = label, %mode, "begin transaction");
        let behavior = to_behavior(mode);
        // Dropping an uncommitted transaction rolls it back, so a failed
        // attempt leaves nothing behind before the next one.
        self.call(label, move |c| {
            let tx = c.transaction_with_behavior(behavior)?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await
    }

    /// Close the connection. Other clones of this handle stop working.
    pub async fn close(self) -> Result<(), LitesafeError> {
        let path = self.descriptor.path.clone();
        self.conn
            .close()
            .await
            .map_err(|e| LitesafeError::Storage {
                source: format!("closing `{path}`: {e}").into(),
            })?;
        debug!(%path, "store closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection_string::ConnectionDescriptor;
    use crate::guard::ConnectionGuard;
    use crate::interceptor::{BusyTimeoutInterceptor, PreferDeferredInterceptor};
    use litesafe_core::OpenMode;
    use litesafe_resilience::RetryPolicy;
    use std::time::Duration;
    use tempfile::tempdir;

    async fn open_at(path: &std::path::Path, chain: InterceptorChain) -> Database {
        let descriptor = ConnectionGuard::allowing_create().validate(ConnectionDescriptor::new(
            path.to_string_lossy(),
            "sqlite",
        ));
        Database::open(
            descriptor,
            chain,
            RetryInterceptor::new(RetryPolicy::new(3, Duration::from_millis(5))),
            WriteModeSelector::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn call_returns_closure_value() {
        let dir = tempdir().unwrap();
        let db = open_at(&dir.path().join("a.db"), InterceptorChain::default()).await;
        let n: i64 = db
            .call("select", |c| c.query_row("SELECT 40 + 2", [], |r| r.get(0)))
            .await
            .unwrap();
        assert_eq!(n, 42);
    }

    #[tokio::test]
    async fn default_mode_without_interceptor_is_immediate() {
        let dir = tempdir().unwrap();
        let db = open_at(&dir.path().join("a.db"), InterceptorChain::default()).await;
        assert_eq!(db.settings().default_mode, TransactionMode::Immediate);

        let chain = InterceptorChain::builder()
            .try_add(PreferDeferredInterceptor)
            .try_add(BusyTimeoutInterceptor::new(Duration::from_millis(20)))
            .build();
        let db = open_at(&dir.path().join("b.db"), chain).await;
        assert_eq!(db.settings().default_mode, TransactionMode::Deferred);
        assert_eq!(db.settings().busy_timeout, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn failed_transaction_rolls_back() {
        let dir = tempdir().unwrap();
        let db = open_at(&dir.path().join("a.db"), InterceptorChain::default()).await;
        db.call("schema", |c| c.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)"))
            .await
            .unwrap();

        let err = db
            .with_transaction("insert", |tx| {
                tx.execute("INSERT INTO t (id) VALUES (1)", [])?;
                tx.execute("INSERT INTO t (id) VALUES (1)", [])?;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LitesafeError::Storage { .. }));

        let count: i64 = db
            .call("count", |c| c.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let dir = tempdir().unwrap();
        let db = open_at(&dir.path().join("a.db"), InterceptorChain::default()).await;
        db.transaction(OperationKind::Schema, "schema", |tx| {
            tx.execute_batch("CREATE TABLE t (v TEXT)")
        })
        .await
        .unwrap();
        db.transaction(OperationKind::ShortWrite, "insert", |tx| {
            tx.execute("INSERT INTO t (v) VALUES ('x')", []).map(|_| ())
        })
        .await
        .unwrap();
        let v: String = db
            .call("read", |c| c.query_row("SELECT v FROM t", [], |r| r.get(0)))
            .await
            .unwrap();
        assert_eq!(v, "x");
    }

    #[tokio::test]
    async fn unconfigured_descriptor_is_config_error() {
        let descriptor = ConnectionGuard::new().validate(ConnectionDescriptor::new("", "sqlite"));
        let err = Database::open(
            descriptor,
            InterceptorChain::default(),
            RetryInterceptor::default(),
            WriteModeSelector::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LitesafeError::Config(_)));
    }

    #[tokio::test]
    async fn missing_file_read_write_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let descriptor = ConnectionGuard::new().validate(
            ConnectionDescriptor::new(path.to_string_lossy(), "sqlite")
                .with_mode(OpenMode::ReadWrite),
        );
        let err = Database::open(
            descriptor,
            InterceptorChain::default(),
            RetryInterceptor::default(),
            WriteModeSelector::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LitesafeError::Config(_)));
        assert!(!path.exists());
    }
}
