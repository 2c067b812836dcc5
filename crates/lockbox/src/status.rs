// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal output for status, listings and reports.

use std::io::IsTerminal;
use std::path::Path;

use lockbox_core::{BruteForceConfig, ImportReport, VaultItem, VaultState};

/// Human-readable label for a lock state.
fn state_label(state: VaultState) -> String {
    match state {
        VaultState::Uninitialized => "not initialized".to_string(),
        VaultState::Locked => "locked".to_string(),
        VaultState::LockedOut { remaining_secs } => {
            format!("locked out ({})", format_remaining(remaining_secs))
        }
        VaultState::Unlocked => "unlocked".to_string(),
    }
}

fn format_remaining(secs: u64) -> String {
    let minutes = secs / 60;
    let seconds = secs % 60;
    if minutes > 0 {
        format!("{minutes}m {seconds}s left")
    } else {
        format!("{seconds}s left")
    }
}

/// Print the vault location and lock state.
pub fn print_state(path: &Path, state: VaultState, plain: bool) {
    let use_color = !plain && std::io::stdout().is_terminal();
    let label = state_label(state);

    println!();
    println!("  lockbox status");
    println!("  {}", "-".repeat(35));
    println!("    Vault:    {}", path.display());

    if use_color {
        use colored::Colorize;
        let painted = match state {
            VaultState::Uninitialized => label.yellow(),
            VaultState::Locked | VaultState::Unlocked => label.green(),
            VaultState::LockedOut { .. } => label.red(),
        };
        println!("    State:    {painted}");
    } else {
        println!("    State:    {label}");
    }

    if state == VaultState::Uninitialized {
        println!();
        println!("  Create one with: lockbox init");
    }
    println!();
}

/// One line per item: id, kind, name and tags.
pub fn print_items(items: &[VaultItem]) {
    for item in items {
        let kind = match item.kind.mime() {
            Some(mime) if !matches!(item.kind, lockbox_core::ItemKind::Key) => {
                format!("{}:{mime}", item.kind.as_str())
            }
            _ => item.kind.as_str().to_string(),
        };
        if item.tags.is_empty() {
            println!("{}  {kind:<20} {}", item.id, item.name);
        } else {
            println!("{}  {kind:<20} {}  [{}]", item.id, item.name, item.tags.join(", "));
        }
    }
}

pub fn print_import(report: &ImportReport) {
    println!(
        "Imported {} entries, {} rows skipped.",
        report.success_count, report.error_count
    );
    for error in &report.errors {
        println!("  {error}");
    }
}

pub fn print_lockout(config: &BruteForceConfig) {
    if config.enabled {
        println!(
            "Lockout after {} failed attempts for {} minutes.",
            config.max_attempts, config.lockout_duration_minutes
        );
    } else {
        println!("Lockout disabled.");
    }
}
