// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the configuration, resilience, and SQLite crates.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How a store file may be opened.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
    /// Opens the file read-write, creating it first if it does not exist.
    /// This is the engine default when a connection string omits `Mode`.
    #[default]
    ReadWriteCreate,
}

/// Shared-cache setting carried by a connection string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum CacheMode {
    #[default]
    Default,
    Private,
    Shared,
}

/// When a transaction takes the store's write lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum TransactionMode {
    /// Lock acquired lazily on the first write.
    Deferred,
    /// Write lock acquired at `BEGIN`; readers still proceed in WAL mode.
    Immediate,
    /// Write lock acquired at `BEGIN` and readers excluded outside WAL mode.
    Exclusive,
}

/// The shape of work a caller is about to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum OperationKind {
    Read,
    ShortWrite,
    BulkWrite,
    Schema,
}

/// Journal mode applied when a store file is created.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    #[default]
    Wal,
}

impl JournalMode {
    /// The value expected by `PRAGMA journal_mode`.
    pub fn pragma_value(&self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Persist => "PERSIST",
            JournalMode::Wal => "WAL",
        }
    }
}

/// Health status reported by store health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Store is reachable and answered a trivial query.
    Healthy,
    /// Store is reachable but the health query reported a problem.
    Degraded(String),
    /// Store is not reachable.
    Unhealthy(String),
}
