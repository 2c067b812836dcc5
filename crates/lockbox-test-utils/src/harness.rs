// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end vault tests.
//!
//! `TestVault` opens a real vault on a temp SQLite file with a cheap KDF
//! cost and a manual clock, so tests run fast and control time.

use std::sync::Arc;

use chrono::DateTime;
use lockbox_config::{KdfCost, KdfProfiles, LockboxConfig};
use lockbox_core::{BruteForceConfig, LockboxError};
use lockbox_vault::{ManualClock, Vault};
use secrecy::SecretString;

/// Passphrase used by [`TestVault::unlocked`].
pub const TEST_PASSPHRASE: &str = "correct horse battery staple";

/// Argon2id cost low enough for unit tests.
pub const TEST_KDF_COST: KdfCost = KdfCost {
    memory_kib: 1024,
    iterations: 1,
    parallelism: 1,
};

/// Builder for [`TestVault`].
pub struct TestVaultBuilder {
    brute_force: BruteForceConfig,
    auto_lock_minutes: u32,
    wal_mode: bool,
}

impl TestVaultBuilder {
    fn new() -> Self {
        Self {
            brute_force: BruteForceConfig::default(),
            auto_lock_minutes: 0,
            wal_mode: true,
        }
    }

    /// Lockout policy written into the vault record at initialization.
    pub fn with_brute_force(mut self, config: BruteForceConfig) -> Self {
        self.brute_force = config;
        self
    }

    /// Idle minutes before auto-lock. 0, the default, disables it.
    pub fn with_auto_lock_minutes(mut self, minutes: u32) -> Self {
        self.auto_lock_minutes = minutes;
        self
    }

    pub fn with_wal_mode(mut self, enabled: bool) -> Self {
        self.wal_mode = enabled;
        self
    }

    /// Open an uninitialized vault.
    pub async fn build(self) -> Result<TestVault, LockboxError> {
        let temp_dir = tempfile::TempDir::new()?;
        let mut config = LockboxConfig::default();
        config.storage.database_path = temp_dir.path().join("vault.db").to_string_lossy().into_owned();
        config.storage.wal_mode = self.wal_mode;
        config.vault.auto_lock_minutes = self.auto_lock_minutes;
        config.vault.kdf = KdfProfiles::uniform(TEST_KDF_COST);
        config.brute_force = self.brute_force;

        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_767_225_600, 0).unwrap_or_default(),
        ));
        let vault = Vault::open_with_clock(&config, clock.clone()).await?;
        Ok(TestVault {
            vault: Arc::new(vault),
            clock,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A vault on a temp database, cleaned up on drop.
pub struct TestVault {
    pub vault: Arc<Vault>,
    /// Drives auto-lock and lockout expiry.
    pub clock: Arc<ManualClock>,
    pub config: LockboxConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestVault {
    pub fn builder() -> TestVaultBuilder {
        TestVaultBuilder::new()
    }

    /// A default vault, initialized with [`TEST_PASSPHRASE`] and unlocked.
    pub async fn unlocked() -> Result<Self, LockboxError> {
        let harness = Self::builder().build().await?;
        harness.initialize_and_unlock().await?;
        Ok(harness)
    }

    pub fn passphrase() -> SecretString {
        SecretString::from(TEST_PASSPHRASE)
    }

    pub async fn initialize_and_unlock(&self) -> Result<(), LockboxError> {
        self.vault.initialize_vault(&Self::passphrase(), None).await?;
        self.vault.unlock_vault(&Self::passphrase()).await
    }

    /// Replace the vault with a fresh instance on the same file, as after a
    /// process restart. The new instance starts locked.
    pub async fn restart(&mut self) -> Result<(), LockboxError> {
        let reopened = Vault::open_with_clock(&self.config, self.clock.clone()).await?;
        self.vault = Arc::new(reopened);
        Ok(())
    }

    /// Flip a byte in an item's stored name so it no longer authenticates.
    pub async fn corrupt_item_name(&self, id: &str) -> Result<(), LockboxError> {
        self.corrupt("UPDATE items SET name = ?2 WHERE id = ?1", "SELECT name FROM items WHERE id = ?1", id)
            .await
    }

    /// Flip a byte in an item's stored content so it no longer authenticates.
    pub async fn corrupt_item_content(&self, id: &str) -> Result<(), LockboxError> {
        self.corrupt(
            "UPDATE item_content SET envelope = ?2 WHERE item_id = ?1",
            "SELECT envelope FROM item_content WHERE item_id = ?1",
            id,
        )
        .await
    }

    async fn corrupt(&self, update: &'static str, select: &'static str, id: &str) -> Result<(), LockboxError> {
        let id = id.to_string();
        self.vault
            .database()
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let mut blob: Vec<u8> = conn.query_row(select, [&id], |row| row.get(0))?;
                if let Some(last) = blob.last_mut() {
                    *last ^= 0xff;
                }
                conn.execute(update, rusqlite::params![id, blob])?;
                Ok(())
            })
            .await
            .map_err(lockbox_storage::database::map_tr_err)
    }
}
