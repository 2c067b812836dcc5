// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Lockbox vault.
//!
//! Stores the vault record and the item hierarchy. Names, comments, tags and
//! content arrive here already encrypted; this crate only moves envelopes
//! between SQLite and the vault engine.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod snapshot;

pub use database::Database;
pub use models::*;
