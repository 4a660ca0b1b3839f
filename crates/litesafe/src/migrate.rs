// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `litesafe migrate` command implementation.

use litesafe_core::LitesafeError;
use litesafe_sqlite::migrations::applied_version;
use litesafe_sqlite::{run_migrations, SqliteStore};

/// Apply pending migrations, waiting up to the provider's lock timeout for
/// another process that is already migrating.
pub async fn run_migrate(store: &SqliteStore) -> Result<usize, LitesafeError> {
    let db = store.database().await?;
    let locks = store.locks().await?;
    let applied = run_migrations(db, locks, store.provider().lock_timeout()).await?;
    let version = applied_version(db)
        .await?
        .unwrap_or_else(|| "none".to_string());
    if applied == 0 {
        println!("{}: up to date at {version}", db.path());
    } else {
        println!("{}: applied {applied} migration(s), now at {version}", db.path());
    }
    Ok(applied)
}
