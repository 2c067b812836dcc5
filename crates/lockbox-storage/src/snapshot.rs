// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Whole-database copies through SQLite's online Backup API.
//!
//! Copies are page-level and consistent even with the WAL active, so the
//! envelopes in a snapshot are byte-identical to the live ones.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lockbox_core::LockboxError;
use rusqlite::backup::Backup;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::database::{Database, map_tr_err};

/// Pages copied per backup step.
const PAGES_PER_STEP: std::os::raw::c_int = 100;
const STEP_PAUSE: Duration = Duration::from_millis(10);

/// What a snapshot file contains, checked before it is restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub item_count: u64,
}

/// Copy the live database into a new file at `dest`.
pub async fn backup_to(db: &Database, dest: &Path) -> Result<(), LockboxError> {
    let dest: PathBuf = dest.to_path_buf();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let mut dst = Connection::open(&dest)?;
            let backup = Backup::new(conn, &mut dst)?;
            backup.run_to_completion(PAGES_PER_STEP, STEP_PAUSE, None)?;
            drop(backup);
            // the copied header keeps the source's WAL flag; snapshots are read-only files
            dst.pragma_update_and_check(None, "journal_mode", "DELETE", |row| {
                row.get::<_, String>(0)
            })?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    debug!("database snapshot written");
    Ok(())
}

/// Replace the live database contents with the snapshot at `src`.
pub async fn restore_from(db: &Database, src: &Path) -> Result<(), LockboxError> {
    let src: PathBuf = src.to_path_buf();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let source = Connection::open_with_flags(&src, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
            let backup = Backup::new(&source, conn)?;
            backup.run_to_completion(PAGES_PER_STEP, STEP_PAUSE, None)?;
            drop(backup);
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        })
        .await
        .map_err(map_tr_err)?;
    debug!("database restored from snapshot");
    Ok(())
}

/// Open a snapshot read-only and confirm it holds a vault record.
///
/// Blocking; call from `spawn_blocking`.
pub fn inspect_snapshot(path: &Path) -> Result<SnapshotInfo, LockboxError> {
    let invalid = |e: rusqlite::Error| {
        LockboxError::InvalidInput(format!("archive does not contain a usable vault: {e}"))
    };
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(invalid)?;
    let has_record: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM vault_meta WHERE key = 'kdf_params')
                 AND EXISTS(SELECT 1 FROM vault_meta WHERE key = 'canary')",
            [],
            |row| row.get(0),
        )
        .map_err(invalid)?;
    if !has_record {
        return Err(LockboxError::InvalidInput(
            "archive database has no vault record".to_string(),
        ));
    }
    let item_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
        .map_err(invalid)?;
    Ok(SnapshotInfo {
        item_count: u64::try_from(item_count).unwrap_or_default(),
    })
}
