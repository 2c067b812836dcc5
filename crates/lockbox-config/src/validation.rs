// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use lockbox_core::KdfPreset;

use crate::diagnostic::ConfigError;
use crate::model::LockboxConfig;

/// Smallest accepted Argon2id memory cost (32 MiB).
pub const MIN_KDF_MEMORY_KIB: u32 = 32 * 1024;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of stopping at the first one.
pub fn validate_config(config: &LockboxConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if !LOG_LEVELS.contains(&config.log.level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` is not one of {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    for preset in [KdfPreset::Fast, KdfPreset::Recommended, KdfPreset::Paranoid] {
        let cost = config.vault.kdf.for_preset(preset);
        if cost.memory_kib < MIN_KDF_MEMORY_KIB {
            errors.push(ConfigError::Validation {
                message: format!(
                    "vault.kdf.{preset}.memory_kib must be at least {MIN_KDF_MEMORY_KIB} (32 MiB), got {}",
                    cost.memory_kib
                ),
            });
        }
        if cost.iterations < 1 {
            errors.push(ConfigError::Validation {
                message: format!("vault.kdf.{preset}.iterations must be at least 1"),
            });
        }
        if !(1..=64).contains(&cost.parallelism) {
            errors.push(ConfigError::Validation {
                message: format!(
                    "vault.kdf.{preset}.parallelism must be between 1 and 64, got {}",
                    cost.parallelism
                ),
            });
        }
    }

    let brute_force = &config.brute_force;
    if brute_force.enabled && brute_force.max_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "brute_force.max_attempts must be at least 1 when lockout is enabled"
                .to_string(),
        });
    }
    if brute_force.enabled && brute_force.lockout_duration_minutes == 0 {
        errors.push(ConfigError::Validation {
            message: "brute_force.lockout_duration_minutes must be at least 1 when lockout is enabled"
                .to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
