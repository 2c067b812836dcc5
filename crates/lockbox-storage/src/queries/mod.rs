// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules. Every function takes `&Database` and runs through its
//! single connection.

pub mod items;
pub mod meta;
