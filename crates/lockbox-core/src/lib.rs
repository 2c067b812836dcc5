// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Lockbox encrypted vault.
//!
//! Holds the error taxonomy and the domain types that cross crate
//! boundaries: item kinds, sort orders, key-derivation presets, brute-force
//! settings, and the decrypted item view handed to callers.

pub mod error;
pub mod types;

pub use error::{ErrorKind, ErrorResponse, LockboxError};
pub use types::{
    BruteForceConfig, ImportReport, ItemKind, KdfPreset, SortOrder, VaultItem, VaultState,
};
