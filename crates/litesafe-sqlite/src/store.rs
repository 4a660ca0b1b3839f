// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lazily opened store handle.

use std::sync::Arc;

use litesafe_core::{HealthStatus, LitesafeError};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::database::Database;
use crate::locking::LockManager;
use crate::provider::SqliteProvider;

/// A store that opens on first use.
///
/// The connection string is guarded and opened the first time
/// [`database`](Self::database) is awaited; concurrent first callers share
/// one open. A failed open is not cached, so a later call tries again.
#[derive(Debug)]
pub struct SqliteStore {
    provider: Arc<SqliteProvider>,
    connection_string: String,
    db: OnceCell<Database>,
    locks: OnceCell<LockManager>,
}

impl SqliteStore {
    pub fn new(provider: Arc<SqliteProvider>, connection_string: impl Into<String>) -> Self {
        Self {
            provider,
            connection_string: connection_string.into(),
            db: OnceCell::new(),
            locks: OnceCell::new(),
        }
    }

    pub fn provider(&self) -> &SqliteProvider {
        &self.provider
    }

    pub fn is_open(&self) -> bool {
        self.db.initialized()
    }

    pub async fn database(&self) -> Result<&Database, LitesafeError> {
        self.db
            .get_or_try_init(|| self.provider.open_str(&self.connection_string))
            .await
    }

    pub async fn locks(&self) -> Result<&LockManager, LitesafeError> {
        let db = self.database().await?;
        self.locks
            .get_or_try_init(|| self.provider.lock_manager(db))
            .await
    }

    /// Check the store with `SELECT 1`. Opens it if needed.
    pub async fn health_check(&self) -> HealthStatus {
        let db = match self.database().await {
            Ok(db) => db,
            Err(e) => return HealthStatus::Unhealthy(e.to_string()),
        };
        match db
            .call("health", |c| c.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)))
            .await
        {
            Ok(1) => HealthStatus::Healthy,
            Ok(other) => HealthStatus::Degraded(format!("`SELECT 1` returned {other}")),
            Err(e) => HealthStatus::Degraded(e.to_string()),
        }
    }

    /// Checkpoint the WAL if the store was opened. A store that was never
    /// opened is left alone.
    pub async fn close(&self) -> Result<(), LitesafeError> {
        if let Some(db) = self.db.get() {
            db.without_cancellation()
                .call("checkpoint", |c| c.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);"))
                .await?;
            debug!(path = db.path(), "WAL checkpoint complete");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn opens_lazily_and_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lazy.db");
        let provider = Arc::new(SqliteProvider::default());
        provider.creator().create(&path).await.unwrap();

        let store = SqliteStore::new(provider, format!("Data Source={}", path.display()));
        assert!(!store.is_open());
        let first = store.database().await.unwrap() as *const Database;
        let second = store.database().await.unwrap() as *const Database;
        assert_eq!(first, second);
        assert_eq!(store.health_check().await, HealthStatus::Healthy);
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_store_is_unhealthy_and_not_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.db");
        let store = SqliteStore::new(
            Arc::new(SqliteProvider::default()),
            format!("Data Source={};Mode=ReadWriteCreate", path.display()),
        );
        assert!(matches!(store.health_check().await, HealthStatus::Unhealthy(_)));
        assert!(!store.is_open());
        assert!(!path.exists());
        // Never opened, nothing to checkpoint.
        store.close().await.unwrap();
    }
}
