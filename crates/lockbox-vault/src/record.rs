// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The vault record and canary verification.
//!
//! A candidate key is accepted when it authenticates the canary envelope.
//! The decrypted canary text is never compared; the GCM tag is the proof.

use lockbox_core::{BruteForceConfig, LockboxError};
use lockbox_storage::queries::meta;
use lockbox_storage::{Database, FailureState, VaultRecordRow};

use crate::crypto::{self, MasterKey};
use crate::kdf::KdfParams;

/// Fixed plaintext sealed as the canary.
pub const CANARY_PLAINTEXT: &[u8] = b"lockbox-canary-v1";

/// Decoded vault record.
#[derive(Debug, Clone)]
pub struct VaultRecord {
    pub params: KdfParams,
    pub canary: Vec<u8>,
    pub brute_force: BruteForceConfig,
    pub failures: FailureState,
}

impl VaultRecord {
    fn from_row(row: VaultRecordRow) -> Result<Self, LockboxError> {
        let brute_force = if row.brute_force_config.is_empty() {
            BruteForceConfig::default()
        } else {
            serde_json::from_slice(&row.brute_force_config)?
        };
        Ok(Self {
            params: serde_json::from_slice(&row.kdf_params)?,
            canary: row.canary,
            brute_force,
            failures: row.failures,
        })
    }

    /// Read the record, `None` if the vault is uninitialized.
    pub async fn load(db: &Database) -> Result<Option<Self>, LockboxError> {
        meta::load_vault_record(db)
            .await?
            .map(Self::from_row)
            .transpose()
    }

    /// Read the record or fail with `VaultNotInitialized`.
    pub async fn require(db: &Database) -> Result<Self, LockboxError> {
        Self::load(db).await?.ok_or(LockboxError::VaultNotInitialized)
    }
}

/// Seal the canary under `key`.
pub fn seal_canary(key: &MasterKey) -> Result<Vec<u8>, LockboxError> {
    crypto::seal(key, CANARY_PLAINTEXT)
}

/// Whether `key` authenticates `canary`.
pub fn verify_canary(key: &MasterKey, canary: &[u8]) -> bool {
    crypto::open(key, canary).is_ok()
}
