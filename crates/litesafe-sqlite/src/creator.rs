// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Explicit store creation.
//!
//! Ordinary opens never create a store (see [`crate::guard`]); this is the
//! one place that does.

use std::path::Path;

use litesafe_core::{JournalMode, LitesafeError, OpenMode, PROVIDER_NAME};
use tracing::info;

use crate::connection_string::ConnectionDescriptor;
use crate::guard::ConnectionGuard;
use crate::migrations::LOCK_TABLE_SQL;

/// Creates store files with a journal mode and the lock table in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabaseCreator {
    journal_mode: JournalMode,
}

impl DatabaseCreator {
    pub fn new(journal_mode: JournalMode) -> Self {
        Self { journal_mode }
    }

    pub fn journal_mode(&self) -> JournalMode {
        self.journal_mode
    }

    /// Create the store at `path`. Returns `false` if it already existed,
    /// in which case it is left untouched.
    pub async fn create(&self, path: &Path) -> Result<bool, LitesafeError> {
        if path.exists() {
            info!(path = %path.display(), "store already exists");
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LitesafeError::Config(format!(
                    "cannot create directory `{}`: {e}",
                    parent.display()
                ))
            })?;
        }

        let descriptor = ConnectionGuard::allowing_create().validate(
            ConnectionDescriptor::new(path.to_string_lossy(), PROVIDER_NAME)
                .with_mode(OpenMode::ReadWriteCreate),
        );
        let conn = tokio_rusqlite::Connection::open_with_flags(&descriptor.path, descriptor.open_flags())
            .await
            .map_err(|e| {
                LitesafeError::Config(format!("cannot create store `{}`: {e}", path.display()))
            })?;

        let pragma = self.journal_mode.pragma_value();
        let applied: String = conn
            .call(move |c| {
                let applied: String =
                    c.query_row(&format!("PRAGMA journal_mode = {pragma}"), [], |r| r.get(0))?;
                c.execute_batch(LOCK_TABLE_SQL)?;
                Ok::<_, rusqlite::Error>(applied)
            })
            .await
            .map_err(|e| LitesafeError::Storage {
                source: Box::new(e),
            })?;
        conn.close().await.map_err(|e| LitesafeError::Storage {
            source: format!("closing new store: {e}").into(),
        })?;

        info!(path = %path.display(), journal_mode = %applied, "store created");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn creates_missing_store_in_wal_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("new.db");

        assert!(DatabaseCreator::default().create(&path).await.unwrap());
        assert!(path.exists());

        let conn = rusqlite::Connection::open(&path).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |r| r.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'distributed_locks'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[tokio::test]
    async fn existing_store_is_left_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.db");
        let creator = DatabaseCreator::new(JournalMode::Delete);
        assert!(creator.create(&path).await.unwrap());
        assert!(!creator.create(&path).await.unwrap());
    }
}
