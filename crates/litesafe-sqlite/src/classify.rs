// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failure classification for a single command attempt.

use std::error::Error as StdError;

use litesafe_core::LitesafeError;
use litesafe_resilience::Classify;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Coarse class of an attempt failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// `SQLITE_BUSY`: another connection holds a conflicting file lock.
    Busy,
    /// `SQLITE_LOCKED`: a conflicting lock inside the same shared cache.
    Locked,
    /// A named lock row belongs to someone else.
    LockHeld,
    /// Anything the caller must fix: constraints, syntax, missing tables.
    Logical,
    /// The connection's worker thread is gone.
    Closed,
}

impl ErrorClass {
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorClass::Busy | ErrorClass::Locked | ErrorClass::LockHeld)
    }
}

/// Classify an engine error by its primary result code.
pub fn classify_sqlite(err: &rusqlite::Error) -> ErrorClass {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) => ErrorClass::Busy,
        Some(ErrorCode::DatabaseLocked) => ErrorClass::Locked,
        _ => ErrorClass::Logical,
    }
}

/// Why one attempt failed.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection unavailable: {0}")]
    Connection(#[source] tokio_rusqlite::Error<rusqlite::Error>),

    #[error("lock `{resource}` is held{}", owner_suffix(.owner))]
    LockHeld {
        resource: String,
        owner: Option<String>,
    },

    /// The migration runner failed. Transient when the engine error
    /// underneath is busy or locked.
    #[error("migration failed: {0}")]
    Migration(#[source] refinery::Error),
}

fn owner_suffix(owner: &Option<String>) -> String {
    owner.as_deref().map(|o| format!(" by {o}")).unwrap_or_default()
}

impl AttemptError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AttemptError::Sqlite(err) => classify_sqlite(err),
            AttemptError::Connection(_) => ErrorClass::Closed,
            AttemptError::LockHeld { .. } => ErrorClass::LockHeld,
            AttemptError::Migration(err) => engine_error_in(err.kind())
                .map(classify_sqlite)
                .unwrap_or(ErrorClass::Logical),
        }
    }
}

/// The first engine error in `err`'s source chain.
fn engine_error_in<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a rusqlite::Error> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(engine) = e.downcast_ref::<rusqlite::Error>() {
            return Some(engine);
        }
        current = e.source();
    }
    None
}

impl Classify for AttemptError {
    type Kind = ErrorClass;

    fn kind(&self) -> ErrorClass {
        self.class()
    }

    fn is_transient(&self) -> bool {
        self.class().is_transient()
    }
}

/// A failure that was not retried, surfaced verbatim.
impl From<AttemptError> for LitesafeError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::Sqlite(source) => LitesafeError::Storage {
                source: Box::new(source),
            },
            AttemptError::Connection(source) => LitesafeError::Storage {
                source: Box::new(source),
            },
            AttemptError::LockHeld { resource, owner } => LitesafeError::Internal(format!(
                "lock `{resource}` held by {} escaped the retry loop",
                owner.as_deref().unwrap_or("an unknown owner")
            )),
            AttemptError::Migration(source) => LitesafeError::Migration {
                source: Box::new(source),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    fn failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), None)
    }

    #[test]
    fn busy_and_locked_are_transient() {
        assert_eq!(classify_sqlite(&failure(ffi::SQLITE_BUSY)), ErrorClass::Busy);
        assert_eq!(classify_sqlite(&failure(ffi::SQLITE_LOCKED)), ErrorClass::Locked);
        assert!(AttemptError::Sqlite(failure(ffi::SQLITE_BUSY)).is_transient());
        assert!(AttemptError::Sqlite(failure(ffi::SQLITE_LOCKED)).is_transient());
    }

    #[test]
    fn extended_busy_codes_are_transient() {
        // SQLITE_BUSY_SNAPSHOT
        let err = failure(ffi::SQLITE_BUSY | (2 << 8));
        assert_eq!(classify_sqlite(&err), ErrorClass::Busy);
    }

    #[test]
    fn logical_errors_are_not_transient() {
        let constraint = failure(ffi::SQLITE_CONSTRAINT);
        assert_eq!(classify_sqlite(&constraint), ErrorClass::Logical);
        assert!(!AttemptError::Sqlite(constraint).is_transient());
        assert!(!AttemptError::Sqlite(rusqlite::Error::QueryReturnedNoRows).is_transient());
    }

    #[test]
    fn lock_held_is_transient() {
        let err = AttemptError::LockHeld {
            resource: "schema-migration".into(),
            owner: Some("42:abc".into()),
        };
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "lock `schema-migration` is held by 42:abc");
    }

    fn migration_failure(code: i32) -> AttemptError {
        use refinery::error::WrapMigrationError;
        let err = Err::<(), _>(failure(code))
            .migration_err("applying V2__jobs", None)
            .unwrap_err();
        AttemptError::Migration(err)
    }

    #[test]
    fn busy_inside_migration_is_transient() {
        let err = migration_failure(ffi::SQLITE_BUSY);
        assert_eq!(err.class(), ErrorClass::Busy);
        assert!(err.is_transient());
        assert_eq!(migration_failure(ffi::SQLITE_LOCKED).class(), ErrorClass::Locked);
    }

    #[test]
    fn broken_migration_is_logical() {
        let err = migration_failure(ffi::SQLITE_ERROR);
        assert_eq!(err.class(), ErrorClass::Logical);
        let err: LitesafeError = err.into();
        assert!(matches!(err, LitesafeError::Migration { .. }));
    }

    #[test]
    fn logical_error_maps_to_storage() {
        let err: LitesafeError = AttemptError::Sqlite(failure(ffi::SQLITE_CONSTRAINT)).into();
        assert!(matches!(err, LitesafeError::Storage { .. }));
    }
}
