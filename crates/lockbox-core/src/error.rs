// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Lockbox vault engine.

use serde::Serialize;
use strum::{Display, EnumString};
use thiserror::Error;

/// The error type returned by every vault operation.
///
/// Variants map one-to-one onto the user-surfaceable error kinds. Detail
/// strings never carry key material, passphrases, or decrypted content.
#[derive(Debug, Error)]
pub enum LockboxError {
    /// Passphrase verification failed.
    #[error("invalid master key")]
    InvalidMasterKey,

    /// `initialize` was called on a vault that already has a vault record.
    #[error("vault is already initialized")]
    VaultAlreadyInitialized,

    /// An operation needing a vault record ran before initialization.
    #[error("vault is not initialized")]
    VaultNotInitialized,

    /// An operation requiring an unlocked session was attempted while locked.
    #[error("vault is locked")]
    VaultLocked,

    /// Too many consecutive failed unlock attempts.
    #[error("too many failed unlock attempts, retry in {remaining_secs}s")]
    LockedOut { remaining_secs: u64 },

    /// The referenced item does not exist.
    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// Malformed request data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication or decryption failure. Always fail-closed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Persistence-layer failure (database connection, query, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Structured-data encode/decode failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors (e.g. a panicked blocking task).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of [`LockboxError`] for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidMasterKey,
    VaultAlreadyInitialized,
    VaultNotInitialized,
    VaultLocked,
    LockedOut,
    ItemNotFound,
    InvalidInput,
    Io,
    Crypto,
    Storage,
    Serialization,
    Config,
    Internal,
}

impl LockboxError {
    /// Wrap any storage-layer error.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LockboxError::Storage {
            source: Box::new(source),
        }
    }

    /// The kind of this error, stable across releases.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LockboxError::InvalidMasterKey => ErrorKind::InvalidMasterKey,
            LockboxError::VaultAlreadyInitialized => ErrorKind::VaultAlreadyInitialized,
            LockboxError::VaultNotInitialized => ErrorKind::VaultNotInitialized,
            LockboxError::VaultLocked => ErrorKind::VaultLocked,
            LockboxError::LockedOut { .. } => ErrorKind::LockedOut,
            LockboxError::ItemNotFound(_) => ErrorKind::ItemNotFound,
            LockboxError::InvalidInput(_) => ErrorKind::InvalidInput,
            LockboxError::Io(_) => ErrorKind::Io,
            LockboxError::Crypto(_) => ErrorKind::Crypto,
            LockboxError::Storage { .. } => ErrorKind::Storage,
            LockboxError::Serialization(_) => ErrorKind::Serialization,
            LockboxError::Config(_) => ErrorKind::Config,
            LockboxError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for LockboxError {
    fn from(err: serde_json::Error) -> Self {
        LockboxError::Serialization(err.to_string())
    }
}

/// Serialized form handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&LockboxError> for ErrorResponse {
    fn from(err: &LockboxError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
