// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide provider registry.
//!
//! Registration is idempotent: registering a name that is already present
//! keeps the first provider. [`unregister`] is the teardown path for tests
//! and for re-registration with a different configuration.

use std::sync::{Arc, LazyLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use litesafe_core::LitesafeError;
use tracing::debug;

use crate::provider::SqliteProvider;

static PROVIDERS: LazyLock<DashMap<String, Arc<SqliteProvider>>> = LazyLock::new(DashMap::new);

fn key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Register `provider` under its name. Returns `false` if a provider was
/// already registered under that name.
pub fn register(provider: Arc<SqliteProvider>) -> bool {
    let name = key(provider.name());
    match PROVIDERS.entry(name) {
        Entry::Occupied(entry) => {
            debug!(name = %entry.key(), "provider already registered");
            false
        }
        Entry::Vacant(entry) => {
            debug!(name = %entry.key(), "provider registered");
            entry.insert(provider);
            true
        }
    }
}

/// Look up a provider by name, ignoring case.
pub fn lookup(name: &str) -> Result<Arc<SqliteProvider>, LitesafeError> {
    PROVIDERS
        .get(&key(name))
        .map(|entry| Arc::clone(entry.value()))
        .ok_or_else(|| LitesafeError::ProviderNotFound {
            name: name.to_string(),
        })
}

/// Remove the provider registered under `name`. Returns whether one was removed.
pub fn unregister(name: &str) -> bool {
    let removed = PROVIDERS.remove(&key(name)).is_some();
    if removed {
        debug!(name, "provider unregistered");
    }
    removed
}

pub fn is_registered(name: &str) -> bool {
    PROVIDERS.contains_key(&key(name))
}
