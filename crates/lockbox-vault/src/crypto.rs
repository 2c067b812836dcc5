// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM item cipher.
//!
//! Every field and content blob is sealed into an [`Envelope`] with a fresh
//! random 96-bit nonce from the system CSPRNG. Nonces are never derived from
//! the plaintext.

use lockbox_core::LockboxError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Current envelope layout: `version || nonce || ciphertext || tag`.
pub const ENVELOPE_VERSION: u8 = 1;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// A 256-bit vault key. Zeroed when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// A key straight from the CSPRNG, not tied to any passphrase.
    pub fn random() -> Result<Self, LockboxError> {
        let mut bytes = [0u8; KEY_LEN];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| LockboxError::Crypto("failed to generate random key".to_string()))?;
        Ok(Self(bytes))
    }

    fn aead(&self) -> Result<LessSafeKey, LockboxError> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.0)
            .map_err(|_| LockboxError::Crypto("failed to create AES-256-GCM key".to_string()))?;
        Ok(LessSafeKey::new(unbound))
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// One sealed field: nonce plus ciphertext with the GCM tag appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// Serialize for storage.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + NONCE_LEN + self.ciphertext.len());
        out.push(ENVELOPE_VERSION);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse a stored envelope. Structural damage is a `Crypto` error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LockboxError> {
        let (&version, rest) = bytes
            .split_first()
            .ok_or_else(|| LockboxError::Crypto("empty envelope".to_string()))?;
        if version != ENVELOPE_VERSION {
            return Err(LockboxError::Crypto(format!(
                "unsupported envelope version {version}"
            )));
        }
        if rest.len() < NONCE_LEN + TAG_LEN {
            return Err(LockboxError::Crypto("truncated envelope".to_string()));
        }
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(nonce);
        Ok(Self {
            nonce: nonce_bytes,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Encrypt `plaintext` under `key` with a fresh nonce.
pub fn encrypt_field(key: &MasterKey, plaintext: &[u8]) -> Result<Envelope, LockboxError> {
    let aead = key.aead()?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| LockboxError::Crypto("failed to generate random nonce".to_string()))?;

    let mut in_out = plaintext.to_vec();
    aead.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce_bytes),
        Aad::empty(),
        &mut in_out,
    )
    .map_err(|_| LockboxError::Crypto("AES-256-GCM encryption failed".to_string()))?;

    Ok(Envelope {
        nonce: nonce_bytes,
        ciphertext: in_out,
    })
}

/// Decrypt and authenticate an envelope. Any tag mismatch is a `Crypto` error
/// and no plaintext is returned.
pub fn decrypt_field(key: &MasterKey, envelope: &Envelope) -> Result<Vec<u8>, LockboxError> {
    let aead = key.aead()?;
    let mut in_out = envelope.ciphertext.clone();
    let plaintext = aead
        .open_in_place(
            Nonce::assume_unique_for_key(envelope.nonce),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| {
            LockboxError::Crypto("decryption failed: wrong key or corrupted data".to_string())
        })?;
    Ok(plaintext.to_vec())
}

/// Encrypt straight to storage bytes.
pub fn seal(key: &MasterKey, plaintext: &[u8]) -> Result<Vec<u8>, LockboxError> {
    encrypt_field(key, plaintext).map(|e| e.to_bytes())
}

/// Decrypt storage bytes.
pub fn open(key: &MasterKey, stored: &[u8]) -> Result<Vec<u8>, LockboxError> {
    decrypt_field(key, &Envelope::from_bytes(stored)?)
}

/// Decrypt storage bytes that must hold UTF-8 text.
pub fn open_string(key: &MasterKey, stored: &[u8]) -> Result<String, LockboxError> {
    String::from_utf8(open(key, stored)?)
        .map_err(|_| LockboxError::Crypto("decrypted field is not valid UTF-8".to_string()))
}
