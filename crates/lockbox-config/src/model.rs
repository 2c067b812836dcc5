// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Lockbox vault.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a mistyped key is
//! reported at startup instead of being silently ignored.

use lockbox_core::{BruteForceConfig, KdfPreset};
use serde::{Deserialize, Serialize};

/// Top-level Lockbox configuration.
///
/// Every section is optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LockboxConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Where the vault database lives.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Key derivation and session settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Lockout policy written into a vault record when it is initialized.
    #[serde(default)]
    pub brute_force: BruteForceConfig,
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

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite vault database.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("lockbox").join("vault.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("vault.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Vault session and key-derivation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Preset used when `init` or `rotate` is not given one.
    #[serde(default)]
    pub default_preset: KdfPreset,

    /// Idle minutes before an unlocked session locks itself. 0 disables auto-lock.
    #[serde(default = "default_auto_lock_minutes")]
    pub auto_lock_minutes: u32,

    /// Argon2id costs behind each preset.
    #[serde(default)]
    pub kdf: KdfProfiles,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            default_preset: KdfPreset::default(),
            auto_lock_minutes: default_auto_lock_minutes(),
            kdf: KdfProfiles::default(),
        }
    }
}

fn default_auto_lock_minutes() -> u32 {
    15
}

/// Argon2id cost tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KdfCost {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Parallel lanes.
    pub parallelism: u32,
}

/// Cost tuples for the three named presets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KdfProfiles {
    #[serde(default = "default_fast")]
    pub fast: KdfCost,
    #[serde(default = "default_recommended")]
    pub recommended: KdfCost,
    #[serde(default = "default_paranoid")]
    pub paranoid: KdfCost,
}

impl KdfProfiles {
    pub fn for_preset(&self, preset: KdfPreset) -> KdfCost {
        match preset {
            KdfPreset::Fast => self.fast,
            KdfPreset::Recommended => self.recommended,
            KdfPreset::Paranoid => self.paranoid,
        }
    }

    /// The same cheap cost for every preset. Only meant for tests.
    pub fn uniform(cost: KdfCost) -> Self {
        Self {
            fast: cost,
            recommended: cost,
            paranoid: cost,
        }
    }
}

impl Default for KdfProfiles {
    fn default() -> Self {
        Self {
            fast: default_fast(),
            recommended: default_recommended(),
            paranoid: default_paranoid(),
        }
    }
}

fn default_fast() -> KdfCost {
    KdfCost {
        memory_kib: 256 * 1024,
        iterations: 2,
        parallelism: 2,
    }
}

fn default_recommended() -> KdfCost {
    KdfCost {
        memory_kib: 512 * 1024,
        iterations: 3,
        parallelism: 4,
    }
}

fn default_paranoid() -> KdfCost {
    KdfCost {
        memory_kib: 1024 * 1024,
        iterations: 4,
        parallelism: 4,
    }
}
