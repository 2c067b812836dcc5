// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argon2id key derivation from the master passphrase.
//!
//! [`derive_key`] is the only path from a passphrase to a [`MasterKey`]. The
//! parameters it needs travel with the vault record so a vault can always be
//! reopened with the costs it was created under.

use lockbox_config::KdfCost;
use lockbox_core::{KdfPreset, LockboxError};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{KEY_LEN, MasterKey};

pub const SALT_LEN: usize = 16;
pub const ALGORITHM: &str = "argon2id";
/// Argon2 version 0x13.
pub const VERSION: u32 = 0x13;

/// Key derivation parameters stored in the vault record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: String,
    pub version: u32,
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub preset: KdfPreset,
    /// Hex-encoded random salt.
    pub salt: String,
}

impl KdfParams {
    /// Parameters for `preset` at `cost`, with a fresh random salt.
    pub fn generate(preset: KdfPreset, cost: KdfCost) -> Result<Self, LockboxError> {
        Ok(Self {
            algorithm: ALGORITHM.to_string(),
            version: VERSION,
            memory_kib: cost.memory_kib,
            iterations: cost.iterations,
            parallelism: cost.parallelism,
            preset,
            salt: hex::encode(generate_salt()?),
        })
    }

    fn salt_bytes(&self) -> Result<[u8; SALT_LEN], LockboxError> {
        let raw = hex::decode(&self.salt)
            .map_err(|e| LockboxError::Serialization(format!("invalid KDF salt: {e}")))?;
        raw.try_into().map_err(|_| {
            LockboxError::Serialization(format!("KDF salt must be {SALT_LEN} bytes"))
        })
    }
}

/// Derive the vault key for `passphrase` under `params`.
///
/// Deterministic for the same inputs. CPU- and memory-heavy; async callers
/// should use [`derive_key_blocking`].
pub fn derive_key(passphrase: &[u8], params: &KdfParams) -> Result<MasterKey, LockboxError> {
    if params.algorithm != ALGORITHM || params.version != VERSION {
        return Err(LockboxError::Crypto(format!(
            "unsupported key derivation {} v{:#x}",
            params.algorithm, params.version
        )));
    }
    let salt = params.salt_bytes()?;
    let argon_params = argon2::Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| LockboxError::Crypto(format!("invalid Argon2id parameters: {e}")))?;
    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon_params,
    );

    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase, &salt, output.as_mut())
        .map_err(|e| LockboxError::Crypto(format!("Argon2id key derivation failed: {e}")))?;
    Ok(MasterKey::from_bytes(*output))
}

/// [`derive_key`] on tokio's blocking pool.
pub async fn derive_key_blocking(
    passphrase: &SecretString,
    params: &KdfParams,
) -> Result<MasterKey, LockboxError> {
    let passphrase = Zeroizing::new(passphrase.expose_secret().as_bytes().to_vec());
    let params = params.clone();
    tokio::task::spawn_blocking(move || derive_key(&passphrase, &params))
        .await
        .map_err(|e| LockboxError::Internal(format!("key derivation task failed: {e}")))?
}

/// A random salt from the system CSPRNG.
pub fn generate_salt() -> Result<[u8; SALT_LEN], LockboxError> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| LockboxError::Crypto("failed to generate random salt".to_string()))?;
    Ok(salt)
}
