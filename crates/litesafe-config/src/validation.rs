// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as retry bounds and known log levels.

use crate::diagnostic::ConfigError;
use crate::model::LitesafeConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &LitesafeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.database.provider_name.trim().is_empty() {
        fail("database.provider_name must not be empty".to_string());
    }

    if config.retry.max_attempts < 1 {
        fail("retry.max_attempts must be at least 1, got 0".to_string());
    }

    if config.retry.base_delay_ms < 1 {
        fail("retry.base_delay_ms must be at least 1, got 0".to_string());
    }

    if config.retry.multiplier < 1 {
        fail("retry.multiplier must be at least 1, got 0".to_string());
    }

    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        fail(format!(
            "retry.base_delay_ms ({}) must not exceed retry.max_delay_ms ({})",
            config.retry.base_delay_ms, config.retry.max_delay_ms
        ));
    }

    let level = config.log.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        fail(format!(
            "log.level `{}` is not one of {}",
            config.log.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
