// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Litesafe store safety layer.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use litesafe_core::{JournalMode, PROVIDER_NAME};
use serde::{Deserialize, Serialize};

/// Top-level Litesafe configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LitesafeConfig {
    /// Store location and connection behavior.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Busy-retry backoff, shared by commands and lock acquisition.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Distributed lock defaults.
    #[serde(default)]
    pub lock: LockConfig,

    /// Command timing.
    #[serde(default)]
    pub profiling: ProfilingConfig,

    /// Log output.
    #[serde(default)]
    pub log: LogConfig,
}

impl LitesafeConfig {
    /// Render the effective configuration as TOML, in the same shape the
    /// loader accepts.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Store connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection string, e.g. `Data Source=/var/lib/app/app.db;Mode=ReadWrite`.
    #[serde(default = "default_connection_string")]
    pub connection_string: String,

    /// Provider the connection string targets. Only `sqlite` strings are
    /// guarded and opened by this layer.
    #[serde(default = "default_provider_name")]
    pub provider_name: String,

    /// Allow `Mode=ReadWriteCreate` to create a missing store on open.
    /// Off by default: creation is an explicit administrative action.
    #[serde(default)]
    pub allow_create: bool,

    /// How long the engine itself waits on a file lock before reporting busy.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Journal mode applied when a store is created.
    #[serde(default)]
    pub journal_mode: JournalMode,

    /// Use deferred transactions as the connection default.
    #[serde(default = "default_true")]
    pub prefer_deferred: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connection_string: default_connection_string(),
            provider_name: default_provider_name(),
            allow_create: false,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: JournalMode::default(),
            prefer_deferred: true,
        }
    }
}

fn default_connection_string() -> String {
    let path = dirs::data_dir()
        .map(|p| p.join("litesafe").join("litesafe.db"))
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "litesafe.db".to_string());
    format!("Data Source={path};Mode=ReadWrite")
}

fn default_provider_name() -> String {
    PROVIDER_NAME.to_string()
}

fn default_busy_timeout_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

/// Backoff applied to transient busy/locked errors.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts per command, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Ceiling for a single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor between consecutive delays.
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    50
}

fn default_max_delay_ms() -> u64 {
    2000
}

fn default_multiplier() -> u32 {
    2
}

/// Distributed lock configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    /// Timeout used when a caller does not pass one, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub default_timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

/// Command profiling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilingConfig {
    /// Register the profiling interceptor.
    #[serde(default)]
    pub enabled: bool,

    /// Commands slower than this are logged at warn level, in milliseconds.
    #[serde(default = "default_slow_command_ms")]
    pub slow_command_ms: u64,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            slow_command_ms: default_slow_command_ms(),
        }
    }
}

fn default_slow_command_ms() -> u64 {
    250
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
