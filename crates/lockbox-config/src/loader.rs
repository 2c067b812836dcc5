// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./lockbox.toml` > `~/.config/lockbox/lockbox.toml` >
//! `/etc/lockbox/lockbox.toml`, with `LOCKBOX_*` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::LockboxConfig;

/// Top-level config sections an environment variable may target.
const SECTIONS: &[&str] = &["log", "storage", "vault", "brute_force"];

/// Presets addressable as `LOCKBOX_VAULT_KDF_<PRESET>_<FIELD>`.
const PRESETS: &[&str] = &["fast", "recommended", "paranoid"];

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/lockbox/lockbox.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "lockbox.toml";

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lockbox/lockbox.toml"))
}

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/lockbox/lockbox.toml`
/// 3. `~/.config/lockbox/lockbox.toml`
/// 4. `./lockbox.toml`
/// 5. `LOCKBOX_*` environment variables
pub fn load_config() -> Result<LockboxConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<LockboxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LockboxConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LockboxConfig, figment::Error> {
    tracing::debug!(path = %path.display(), "loading config file");
    Figment::new()
        .merge(Serialized::defaults(LockboxConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment behind [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LockboxConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// `LOCKBOX_*` provider restricted to known sections.
///
/// Variables outside those sections (`LOCKBOX_PASSPHRASE`,
/// `LOCKBOX_NEW_PASSPHRASE`) are not configuration and are filtered out.
fn env_provider() -> Env {
    Env::prefixed("LOCKBOX_")
        .filter(|key| {
            let key = key.as_str().to_ascii_lowercase();
            SECTIONS.iter().any(|s| key.starts_with(&format!("{s}_")))
        })
        .map(|key| map_env_key(&key.as_str().to_ascii_lowercase()).into())
}

/// Map a prefix-stripped env key to a dotted config path.
///
/// Uses explicit section prefixes rather than splitting on `_`, because
/// field names contain underscores: `storage_database_path` must become
/// `storage.database_path`, not `storage.database.path`.
pub(crate) fn map_env_key(key: &str) -> String {
    for preset in PRESETS {
        if let Some(field) = key.strip_prefix(&format!("vault_kdf_{preset}_")) {
            return format!("vault.kdf.{preset}.{field}");
        }
    }
    for section in SECTIONS {
        if let Some(field) = key.strip_prefix(&format!("{section}_")) {
            return format!("{section}.{field}");
        }
    }
    key.to_string()
}
