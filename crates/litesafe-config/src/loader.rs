// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./litesafe.toml` > `~/.config/litesafe/litesafe.toml` > `/etc/litesafe/litesafe.toml`
//! with environment variable overrides via `LITESAFE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::LitesafeConfig;

/// Top-level sections, used to turn `LITESAFE_<SECTION>_<KEY>` into `section.key`.
const SECTIONS: &[&str] = &["database", "retry", "lock", "profiling", "log"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/litesafe/litesafe.toml` (system-wide)
/// 3. `~/.config/litesafe/litesafe.toml` (user XDG config)
/// 4. `./litesafe.toml` (local directory)
/// 5. `LITESAFE_*` environment variables
pub fn load_config() -> Result<LitesafeConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<LitesafeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LitesafeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LitesafeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LitesafeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LitesafeConfig::default()))
        .merge(Toml::file("/etc/litesafe/litesafe.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("litesafe/litesafe.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("litesafe.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")`: key names contain underscores, so
/// `LITESAFE_DATABASE_CONNECTION_STRING` must map to `database.connection_string`,
/// not `database.connection.string`.
fn env_provider() -> Env {
    Env::prefixed("LITESAFE_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

/// The environment variable that sets the value at `path`, the inverse of
/// [`map_env_key`].
pub(crate) fn env_var_for(path: &[&str]) -> String {
    format!("LITESAFE_{}", path.join("_").to_ascii_uppercase())
}
