// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session guard: owns the derived key while the vault is unlocked.
//!
//! The key lives in exactly one place, an `Option<UnlockedKey>` behind an
//! async lock. Locking drops it, and [`MasterKey`] zeroes itself on drop.
//! Idle timeout is enforced lazily on every key access and can also be
//! driven by a background ticker.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use lockbox_core::LockboxError;
use tokio::sync::RwLock;
use tracing::info;

use crate::clock::Clock;
use crate::crypto::MasterKey;

struct UnlockedKey {
    key: MasterKey,
    last_activity_ms: AtomicI64,
}

pub struct SessionGuard {
    slot: RwLock<Option<UnlockedKey>>,
    idle_timeout: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl SessionGuard {
    /// `idle_timeout` of `None` disables auto-lock.
    pub fn new(idle_timeout: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: RwLock::new(None),
            idle_timeout,
            clock,
        }
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Install a verified key, replacing any previous one.
    pub async fn unlock(&self, key: MasterKey) {
        let now = self.clock.now_millis();
        *self.slot.write().await = Some(UnlockedKey {
            key,
            last_activity_ms: AtomicI64::new(now),
        });
    }

    /// Drop the key. Returns whether a session was open.
    pub async fn lock(&self) -> bool {
        self.slot.write().await.take().is_some()
    }

    pub async fn is_unlocked(&self) -> bool {
        self.expire_if_idle().await;
        self.slot.read().await.is_some()
    }

    /// A copy of the session key for one operation, refreshing the idle timer.
    pub async fn key(&self) -> Result<MasterKey, LockboxError> {
        self.expire_if_idle().await;
        let slot = self.slot.read().await;
        let unlocked = slot.as_ref().ok_or(LockboxError::VaultLocked)?;
        unlocked
            .last_activity_ms
            .store(self.clock.now_millis(), Ordering::SeqCst);
        Ok(unlocked.key.clone())
    }

    /// Lock if the session has been idle past the timeout. Returns whether it locked.
    pub async fn expire_if_idle(&self) -> bool {
        let Some(timeout) = self.idle_timeout else {
            return false;
        };
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        let idle = |slot: &Option<UnlockedKey>| {
            slot.as_ref().is_some_and(|u| {
                self.clock.now_millis() - u.last_activity_ms.load(Ordering::SeqCst) >= timeout_ms
            })
        };

        if !idle(&*self.slot.read().await) {
            return false;
        }
        let mut slot = self.slot.write().await;
        // re-check: another task may have used or locked the session meanwhile
        if idle(&*slot) {
            *slot = None;
            info!(idle_secs = timeout.as_secs(), "vault auto-locked after inactivity");
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::DateTime;

    fn guard(timeout: Option<Duration>) -> (Arc<ManualClock>, SessionGuard) {
        let clock = Arc::new(ManualClock::new(DateTime::from_timestamp(1_000, 0).unwrap()));
        let guard = SessionGuard::new(timeout, clock.clone());
        (clock, guard)
    }

    #[tokio::test]
    async fn locked_guard_refuses_key() {
        let (_, guard) = guard(None);
        assert!(matches!(guard.key().await, Err(LockboxError::VaultLocked)));
    }

    #[tokio::test]
    async fn lock_drops_key() {
        let (_, guard) = guard(None);
        guard.unlock(MasterKey::random().unwrap()).await;
        assert!(guard.is_unlocked().await);
        assert!(guard.lock().await);
        assert!(!guard.is_unlocked().await);
        assert!(!guard.lock().await);
    }

    #[tokio::test]
    async fn idle_session_auto_locks() {
        let (clock, guard) = guard(Some(Duration::from_secs(60)));
        guard.unlock(MasterKey::random().unwrap()).await;

        clock.advance(Duration::from_secs(59));
        assert!(guard.key().await.is_ok());

        // activity above reset the timer
        clock.advance(Duration::from_secs(59));
        assert!(guard.is_unlocked().await);

        clock.advance(Duration::from_secs(1));
        assert!(matches!(guard.key().await, Err(LockboxError::VaultLocked)));
    }

    #[tokio::test]
    async fn disabled_timeout_never_expires() {
        let (clock, guard) = guard(None);
        guard.unlock(MasterKey::random().unwrap()).await;
        clock.advance(Duration::from_secs(60 * 60 * 24));
        assert!(!guard.expire_if_idle().await);
        assert!(guard.key().await.is_ok());
    }
}
