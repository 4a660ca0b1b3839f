// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection guard: no store file is ever created by an ordinary open.
//!
//! The engine creates a missing file whenever a connection asks for
//! read-write-create access, which is also what it assumes when the mode is
//! omitted. The guard runs after parsing and before opening and rewrites that
//! mode to plain read-write, so a mistyped path fails loudly instead of
//! producing an empty store. Creating a store is left to
//! [`DatabaseCreator`](crate::creator::DatabaseCreator).

use std::ops::Deref;

use litesafe_core::{LitesafeError, OpenMode, PROVIDER_NAME};
use tracing::debug;

use crate::connection_string::ConnectionDescriptor;

/// A descriptor that has passed through a [`ConnectionGuard`].
///
/// Immutable: the only way to get one is [`ConnectionGuard::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeDescriptor(ConnectionDescriptor);

impl SafeDescriptor {
    pub fn into_inner(self) -> ConnectionDescriptor {
        self.0
    }
}

impl Deref for SafeDescriptor {
    type Target = ConnectionDescriptor;

    fn deref(&self) -> &ConnectionDescriptor {
        &self.0
    }
}

/// Rewrites descriptors aimed at the embedded provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionGuard {
    allow_create: bool,
}

impl ConnectionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A guard that leaves `ReadWriteCreate` alone. For administrative
    /// tooling that creates stores on purpose.
    pub fn allowing_create() -> Self {
        Self { allow_create: true }
    }

    pub fn allows_create(&self) -> bool {
        self.allow_create
    }

    /// Apply the rewrite. Pure and infallible.
    ///
    /// Unconfigured descriptors and descriptors for other providers come
    /// back unchanged.
    pub fn validate(&self, descriptor: ConnectionDescriptor) -> SafeDescriptor {
        if !descriptor.is_configured() || !targets_embedded(&descriptor.provider_name) {
            return SafeDescriptor(descriptor);
        }
        if descriptor.mode == OpenMode::ReadWriteCreate && !self.allow_create {
            debug!(path = %descriptor.path, "downgrading ReadWriteCreate to ReadWrite");
            return SafeDescriptor(descriptor.with_mode(OpenMode::ReadWrite));
        }
        SafeDescriptor(descriptor)
    }
}

fn targets_embedded(provider_name: &str) -> bool {
    provider_name.trim().eq_ignore_ascii_case(PROVIDER_NAME)
}

/// Guard a raw connection string.
///
/// Strings for other providers, and strings with no data source, are returned
/// byte-for-byte. For the embedded provider the canonical form of the guarded
/// descriptor is returned; a malformed string is a [`LitesafeError::Config`]
/// since it would fail to open anyway.
pub fn guard_connection_string(
    conn_str: &str,
    provider_name: &str,
) -> Result<String, LitesafeError> {
    if provider_name.trim().is_empty() || !targets_embedded(provider_name) {
        return Ok(conn_str.to_string());
    }
    let descriptor = ConnectionDescriptor::parse(conn_str, provider_name)?;
    if !descriptor.is_configured() {
        return Ok(conn_str.to_string());
    }
    Ok(ConnectionGuard::new().validate(descriptor).to_string())
}
