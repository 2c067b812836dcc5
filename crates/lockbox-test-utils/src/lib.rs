// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Lockbox integration tests.
//!
//! - [`TestVault`] - a real vault on a temp database with a manual clock

pub mod harness;

pub use harness::{TEST_KDF_COST, TEST_PASSPHRASE, TestVault, TestVaultBuilder};
