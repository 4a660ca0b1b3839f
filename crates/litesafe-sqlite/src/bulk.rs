// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-row insert in a single immediate transaction.

use std::sync::Arc;

use litesafe_core::{LitesafeError, OperationKind};
use rusqlite::types::Value;
use tracing::debug;

use crate::database::Database;

/// Insert `rows` into `table` all-or-nothing.
///
/// Table and column names are checked to be plain identifiers since they are
/// spliced into the statement. Every row must have one value per column.
pub async fn bulk_insert(
    db: &Database,
    table: &str,
    columns: &[&str],
    rows: Vec<Vec<Value>>,
) -> Result<usize, LitesafeError> {
    check_identifier(table)?;
    if columns.is_empty() {
        return Err(LitesafeError::Invalid("bulk insert needs at least one column".into()));
    }
    for column in columns {
        check_identifier(column)?;
    }
    if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
        return Err(LitesafeError::Invalid(format!(
            "row {index} has {} values, expected {}",
            row.len(),
            columns.len()
        )));
    }
    if rows.is_empty() {
        return Ok(0);
    }

    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO \"{table}\" ({}) VALUES ({placeholders})",
        columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let count = rows.len();
    debug!(table, rows = count, "bulk insert");
    let rows = Arc::new(rows);
    db.transaction(OperationKind::BulkWrite, "bulk_insert", move |tx| {
        let mut stmt = tx.prepare_cached(&sql)?;
        for row in rows.iter() {
            stmt.execute(rusqlite::params_from_iter(row.iter()))?;
        }
        Ok(rows.len())
    })
    .await?;
    Ok(count)
}

fn check_identifier(name: &str) -> Result<(), LitesafeError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(LitesafeError::Invalid(format!("`{name}` is not a plain identifier")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(check_identifier("events").is_ok());
        assert!(check_identifier("_t2").is_ok());
        assert!(check_identifier("2t").is_err());
        assert!(check_identifier("a b").is_err());
        assert!(check_identifier("t\"; DROP TABLE x; --").is_err());
        assert!(check_identifier("").is_err());
    }
}
