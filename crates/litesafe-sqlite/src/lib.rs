// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Safety layer for SQLite stores shared by several processes.
//!
//! - [`guard`] keeps ordinary opens from creating store files.
//! - [`write_mode`] picks deferred, immediate or exclusive transactions.
//! - [`retry`] retries busy/locked commands with bounded backoff.
//! - [`locking`] provides named cross-process locks stored in the same file.
//!
//! [`SqliteProvider`] wires these together; [`registry`] makes a provider
//! available process-wide.

pub mod bulk;
pub mod classify;
pub mod connection_string;
pub mod creator;
pub mod database;
pub mod guard;
pub mod interceptor;
pub mod locking;
pub mod migrations;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod store;
pub mod write_mode;

pub use classify::{AttemptError, ErrorClass};
pub use connection_string::{ConnectionDescriptor, ConnectionStringError};
pub use creator::DatabaseCreator;
pub use database::Database;
pub use guard::{guard_connection_string, ConnectionGuard, SafeDescriptor};
pub use interceptor::{
    BusyTimeoutInterceptor, CommandInterceptor, CommandOutcome, ConnectionSettings,
    InterceptorChain, PreferDeferredInterceptor, ProfilingInterceptor,
};
pub use locking::{LockHandle, LockInfo, LockManager, LockState};
pub use migrations::{apply_pending, run_migrations, SCHEMA_MIGRATION_LOCK};
pub use provider::{SqliteProvider, SqliteProviderBuilder};
pub use retry::RetryInterceptor;
pub use store::SqliteStore;
pub use write_mode::WriteModeSelector;
