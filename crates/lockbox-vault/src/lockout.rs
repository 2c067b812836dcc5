// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Brute-force lockout decisions over the persisted failure counter.

use lockbox_core::BruteForceConfig;
use lockbox_storage::FailureState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutStatus {
    /// Attempts are allowed.
    Clear,
    /// The lockout window has passed; the counter should be reset.
    Expired,
    /// Attempts are refused for this many more seconds.
    Active { remaining_secs: u64 },
}

/// Where `failures` stands under `config` at `now_ms`.
pub fn evaluate(config: &BruteForceConfig, failures: &FailureState, now_ms: i64) -> LockoutStatus {
    if !config.enabled || config.max_attempts == 0 || failures.failed_attempts < config.max_attempts {
        return LockoutStatus::Clear;
    }
    let Some(last_failed_at) = failures.last_failed_at else {
        return LockoutStatus::Expired;
    };
    let window_ms = i64::from(config.lockout_duration_minutes) * 60_000;
    let remaining_ms = last_failed_at.saturating_add(window_ms).saturating_sub(now_ms);
    if remaining_ms <= 0 {
        LockoutStatus::Expired
    } else {
        // round up so a caller never sees "0 seconds left" while still locked
        let remaining_secs = u64::try_from(remaining_ms).unwrap_or_default().div_ceil(1000);
        LockoutStatus::Active { remaining_secs }
    }
}
