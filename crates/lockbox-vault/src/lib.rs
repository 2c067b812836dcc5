// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encryption engine and command surface for the Lockbox vault.
//!
//! A passphrase is stretched with Argon2id into a 256-bit key, verified
//! against an AES-256-GCM canary, and held only by the [`SessionGuard`].
//! Every item field and content blob is sealed under that key before it
//! reaches the store.

pub mod clock;
pub mod crypto;
pub mod export;
pub mod import;
pub mod item;
pub mod kdf;
pub mod lockout;
pub mod prompt;
pub mod record;
pub mod rotation;
pub mod session;
pub mod vault;

pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::{Envelope, MasterKey, decrypt_field, encrypt_field};
pub use export::ArchiveManifest;
pub use import::Credential;
pub use item::ItemUpdate;
pub use prompt::{read_new_passphrase, read_passphrase};
pub use session::SessionGuard;
pub use vault::{Vault, spawn_auto_lock};
