// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL migration files are compiled into the binary at build time via
//! `embed_migrations!`. They run under the [`SCHEMA_MIGRATION_LOCK`] named
//! lock so that only one process migrates a shared store at a time.

use std::time::Duration;

use litesafe_core::LitesafeError;
use tracing::info;

use crate::classify::AttemptError;
use crate::database::Database;
use crate::locking::LockManager;

/// Lock held while migrations run.
pub const SCHEMA_MIGRATION_LOCK: &str = "schema-migration";

/// The lock table DDL. Also the first migration, so both paths agree.
pub(crate) const LOCK_TABLE_SQL: &str = include_str!("../migrations/V1__distributed_locks.sql");

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// One attempt of a refinery operation on the worker thread.
async fn attempt_refinery<F, T>(db: &Database, f: F) -> Result<T, AttemptError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<T, refinery::Error> + Send + 'static,
    T: Send + 'static,
{
    db.connection()
        .call(move |c| Ok::<_, rusqlite::Error>(f(c)))
        .await
        .map_err(AttemptError::Connection)?
        .map_err(AttemptError::Migration)
}

/// Apply pending migrations while holding [`SCHEMA_MIGRATION_LOCK`].
///
/// Returns the number of migrations applied. Refinery tracks applied
/// migrations in its own `refinery_schema_history` table.
pub async fn run_migrations(
    db: &Database,
    locks: &LockManager,
    timeout: Duration,
) -> Result<usize, LitesafeError> {
    locks
        .with_lock(SCHEMA_MIGRATION_LOCK, timeout, || apply_pending(db))
        .await
}

/// Apply pending migrations without taking the named lock.
///
/// The runner goes through the store's busy retry: a busy or locked store
/// re-runs it after backoff, and refinery skips what was already applied.
pub async fn apply_pending(db: &Database) -> Result<usize, LitesafeError> {
    let report = db
        .retry()
        .execute(|| attempt_refinery(db, |c| embedded::migrations::runner().run(c)))
        .await?;

    for migration in report.applied_migrations() {
        info!(
            version = %migration.version(),
            name = migration.name(),
            path = db.path(),
            "migration applied"
        );
    }
    Ok(report.applied_migrations().len())
}

/// The most recently applied migration as `V{version}__{name}`, if any.
/// A store that was never migrated has no history table and reports `None`.
pub async fn applied_version(db: &Database) -> Result<Option<String>, LitesafeError> {
    let has_history: i64 = db
        .call("migrations.history", |c| {
            c.query_row(
                "SELECT COUNT(*) FROM sqlite_master \
                 WHERE type = 'table' AND name = 'refinery_schema_history'",
                [],
                |r| r.get(0),
            )
        })
        .await?;
    if has_history == 0 {
        return Ok(None);
    }

    let last = db
        .retry()
        .execute(|| {
            attempt_refinery(db, |c| {
                embedded::migrations::runner().get_last_applied_migration(c)
            })
        })
        .await?;
    Ok(last.map(|m| format!("V{}__{}", m.version(), m.name())))
}

/// Number of migrations compiled into this build.
pub fn embedded_count() -> usize {
    embedded::migrations::runner().get_migrations().len()
}
