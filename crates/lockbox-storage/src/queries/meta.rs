// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault record operations on the `vault_meta` table.

use lockbox_core::LockboxError;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{FailureState, VaultRecordRow, meta_keys};

/// Whether a vault record has been written.
pub async fn vault_exists(db: &Database) -> Result<bool, LockboxError> {
    db.connection()
        .call(|conn| -> Result<bool, rusqlite::Error> {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM vault_meta WHERE key = ?1)",
                params![meta_keys::KDF_PARAMS],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Write a fresh vault record in one transaction.
///
/// Returns `false` without writing anything if a record already exists.
pub async fn create_vault_record(
    db: &Database,
    kdf_params: Vec<u8>,
    canary: Vec<u8>,
    brute_force_config: Vec<u8>,
) -> Result<bool, LockboxError> {
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM vault_meta WHERE key = ?1)",
                params![meta_keys::KDF_PARAMS],
                |row| row.get(0),
            )?;
            if exists {
                return Ok(false);
            }
            {
                let mut stmt = tx.prepare("INSERT INTO vault_meta (key, value) VALUES (?1, ?2)")?;
                stmt.execute(params![meta_keys::KDF_PARAMS, kdf_params])?;
                stmt.execute(params![meta_keys::CANARY, canary])?;
                stmt.execute(params![meta_keys::BRUTE_FORCE_CONFIG, brute_force_config])?;
                stmt.execute(params![meta_keys::FAILED_ATTEMPTS, 0_i64])?;
            }
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// Load the vault record, `None` when the vault is uninitialized.
pub async fn load_vault_record(db: &Database) -> Result<Option<VaultRecordRow>, LockboxError> {
    db.connection()
        .call(|conn| -> Result<Option<VaultRecordRow>, rusqlite::Error> {
            let blob = |key: &str| -> Result<Option<Vec<u8>>, rusqlite::Error> {
                conn.query_row(
                    "SELECT value FROM vault_meta WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
            };
            let (Some(kdf_params), Some(canary)) =
                (blob(meta_keys::KDF_PARAMS)?, blob(meta_keys::CANARY)?)
            else {
                return Ok(None);
            };
            let brute_force_config = blob(meta_keys::BRUTE_FORCE_CONFIG)?.unwrap_or_default();
            let failures = read_failures(conn)?;
            Ok(Some(VaultRecordRow {
                kdf_params,
                canary,
                brute_force_config,
                failures,
            }))
        })
        .await
        .map_err(map_tr_err)
}

/// Replace the serialized brute-force settings.
pub async fn set_brute_force_config(db: &Database, value: Vec<u8>) -> Result<(), LockboxError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO vault_meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![meta_keys::BRUTE_FORCE_CONFIG, value],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record one failed passphrase attempt at `now_ms` and return the new state.
pub async fn record_failure(db: &Database, now_ms: i64) -> Result<FailureState, LockboxError> {
    db.connection()
        .call(move |conn| -> Result<FailureState, rusqlite::Error> {
            let tx = conn.transaction()?;
            let current = read_failures(&tx)?;
            let next = FailureState {
                failed_attempts: current.failed_attempts.saturating_add(1),
                last_failed_at: Some(now_ms),
            };
            write_failures(&tx, next)?;
            tx.commit()?;
            Ok(next)
        })
        .await
        .map_err(map_tr_err)
}

/// Clear the consecutive-failure counter.
pub async fn reset_failures(db: &Database) -> Result<(), LockboxError> {
    db.connection()
        .call(|conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            write_failures(&tx, FailureState::default())?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

fn read_failures(conn: &rusqlite::Connection) -> Result<FailureState, rusqlite::Error> {
    let int = |key: &str| -> Result<Option<i64>, rusqlite::Error> {
        conn.query_row(
            "SELECT value FROM vault_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
    };
    Ok(FailureState {
        failed_attempts: int(meta_keys::FAILED_ATTEMPTS)?
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
            .unwrap_or(0),
        last_failed_at: int(meta_keys::LAST_FAILED_AT)?,
    })
}

fn write_failures(conn: &rusqlite::Connection, state: FailureState) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO vault_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![meta_keys::FAILED_ATTEMPTS, i64::from(state.failed_attempts)],
    )?;
    match state.last_failed_at {
        Some(ts) => conn.execute(
            "INSERT INTO vault_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![meta_keys::LAST_FAILED_AT, ts],
        )?,
        None => conn.execute(
            "DELETE FROM vault_meta WHERE key = ?1",
            params![meta_keys::LAST_FAILED_AT],
        )?,
    };
    Ok(())
}
