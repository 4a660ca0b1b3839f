// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Litesafe embedded store safety layer.
//!
//! This crate provides the error type and the small vocabulary of enums
//! (open modes, transaction modes, operation kinds) shared by the
//! configuration, resilience, and SQLite provider crates.

pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::LitesafeError;
pub use types::{CacheMode, HealthStatus, JournalMode, OpenMode, OperationKind, TransactionMode};

/// Name under which the embedded SQLite provider registers itself.
pub const PROVIDER_NAME: &str = "sqlite";

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::time::Duration;

    #[test]
    fn litesafe_error_has_all_variants() {
        let _config = LitesafeError::Config("test".into());
        let _busy = LitesafeError::TransientBusy {
            attempts: 3,
            source: Box::new(std::io::Error::other("test")),
        };
        let _timeout = LitesafeError::LockTimeout {
            resource: "schema-migration".into(),
            waited: Duration::from_secs(2),
            holder: None,
        };
        let _invalid_handle = LitesafeError::InvalidHandle {
            resource: "schema-migration".into(),
            reason: "test".into(),
        };
        let _storage = LitesafeError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _migration = LitesafeError::Migration {
            source: Box::new(std::io::Error::other("test")),
        };
        let _cancelled = LitesafeError::Cancelled { attempts: 1 };
        let _not_found = LitesafeError::ProviderNotFound {
            name: "test".into(),
        };
        let _invalid = LitesafeError::Invalid("test".into());
        let _internal = LitesafeError::Internal("test".into());
    }

    #[test]
    fn lock_timeout_message_names_resource_and_holder() {
        let err = LitesafeError::LockTimeout {
            resource: "schema-migration".into(),
            waited: Duration::from_secs(2),
            holder: Some("4242:abc".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("`schema-migration`"), "got: {msg}");
        assert!(msg.contains("held by 4242:abc"), "got: {msg}");

        let err = LitesafeError::LockTimeout {
            resource: "schema-migration".into(),
            waited: Duration::from_secs(2),
            holder: None,
        };
        assert!(!err.to_string().contains("held by"));
    }

    #[test]
    fn only_busy_and_timeout_are_transient() {
        assert!(
            LitesafeError::TransientBusy {
                attempts: 1,
                source: Box::new(std::io::Error::other("busy")),
            }
            .is_transient()
        );
        assert!(!LitesafeError::Config("bad".into()).is_transient());
        assert!(
            !LitesafeError::Storage {
                source: Box::new(std::io::Error::other("constraint")),
            }
            .is_transient()
        );
    }

    #[test]
    fn open_mode_parses_case_insensitively() {
        assert_eq!(
            OpenMode::from_str("readwritecreate").unwrap(),
            OpenMode::ReadWriteCreate
        );
        assert_eq!(OpenMode::from_str("ReadOnly").unwrap(), OpenMode::ReadOnly);
        assert!(OpenMode::from_str("memory").is_err());
        assert_eq!(OpenMode::default(), OpenMode::ReadWriteCreate);
    }

    #[test]
    fn journal_mode_serialization() {
        let json = serde_json::to_string(&JournalMode::Wal).expect("should serialize");
        assert_eq!(json, "\"wal\"");
        let parsed: JournalMode = serde_json::from_str("\"truncate\"").expect("should deserialize");
        assert_eq!(parsed, JournalMode::Truncate);
        assert_eq!(JournalMode::Wal.pragma_value(), "WAL");
        assert_eq!(JournalMode::Delete.to_string(), "delete");
    }

    #[test]
    fn health_status_variants() {
        let healthy = HealthStatus::Healthy;
        let degraded = HealthStatus::Degraded("slow".into());
        let unhealthy = HealthStatus::Unhealthy("down".into());

        assert_eq!(healthy, HealthStatus::Healthy);
        assert_ne!(degraded, healthy);
        assert_ne!(unhealthy, healthy);
    }
}
