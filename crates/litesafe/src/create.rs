// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `litesafe create` command implementation.

use std::path::Path;

use litesafe_core::LitesafeError;
use litesafe_sqlite::SqliteProvider;

/// Create the store at `path`. An existing file is left untouched.
pub async fn run_create(provider: &SqliteProvider, path: &Path) -> Result<(), LitesafeError> {
    let creator = provider.creator();
    if creator.create(path).await? {
        println!(
            "created {} (journal_mode={})",
            path.display(),
            creator.journal_mode().pragma_value()
        );
    } else {
        println!("{} already exists, left unchanged", path.display());
    }
    Ok(())
}
