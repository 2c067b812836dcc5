// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types as stored on disk.
//!
//! Byte fields are ciphertext envelopes produced by the vault layer; the
//! storage crate never interprets them.

/// A row of the `items` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub id: String,
    pub parent_id: Option<String>,
    pub kind: String,
    pub content_mime: Option<String>,
    pub folder_type: Option<String>,
    pub name: Vec<u8>,
    pub comments: Option<Vec<u8>>,
    pub tags: Vec<u8>,
    /// RFC 3339, millisecond precision, UTC.
    pub created_at: String,
    pub updated_at: String,
}

/// An item row together with its content envelope, if it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    pub record: ItemRecord,
    pub content: Option<Vec<u8>>,
}

/// Replacement ciphertext for one item during rotation.
#[derive(Debug, Clone)]
pub struct ReencryptedItem {
    pub id: String,
    pub name: Vec<u8>,
    pub comments: Option<Vec<u8>>,
    pub tags: Vec<u8>,
    pub content: Option<Vec<u8>>,
}

/// New tag envelope for one item during a bulk tag edit.
#[derive(Debug, Clone)]
pub struct TagRewrite {
    pub id: String,
    pub tags: Vec<u8>,
    pub updated_at: String,
}

/// Keys of the `vault_meta` table.
/// Result of a re-parenting attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    NotFound,
    /// The new parent is the item itself or lies beneath it.
    WouldCycle,
}

pub mod meta_keys {
    pub const KDF_PARAMS: &str = "kdf_params";
    pub const CANARY: &str = "canary";
    pub const BRUTE_FORCE_CONFIG: &str = "brute_force_config";
    pub const FAILED_ATTEMPTS: &str = "failed_attempts";
    pub const LAST_FAILED_AT: &str = "last_failed_at";
}

/// Persisted consecutive-failure state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureState {
    pub failed_attempts: u32,
    /// Unix milliseconds of the most recent failure.
    pub last_failed_at: Option<i64>,
}

/// The stored vault record, still serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultRecordRow {
    /// JSON-encoded key derivation parameters.
    pub kdf_params: Vec<u8>,
    /// Canary envelope.
    pub canary: Vec<u8>,
    /// JSON-encoded brute-force settings.
    pub brute_force_config: Vec<u8>,
    pub failures: FailureState,
}
