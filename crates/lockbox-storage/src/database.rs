// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database handle: PRAGMA setup, migrations, and lifecycle.
//!
//! Every read and write goes through the one `tokio_rusqlite::Connection`
//! owned by [`Database`], which serializes calls on a background thread.
//! Do not open a second connection for writes.

use std::path::{Path, PathBuf};

use lockbox_core::LockboxError;
use tracing::{debug, info};

use crate::migrations::run_migrations;

/// Convert a tokio-rusqlite error into `LockboxError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> LockboxError {
    LockboxError::Storage {
        source: Box::new(e),
    }
}

/// Per-connection settings. `secure_delete` overwrites freed pages so
/// deleted envelopes do not linger in the file.
const CONNECTION_PRAGMAS: &str = "
    PRAGMA foreign_keys = ON;
    PRAGMA secure_delete = ON;
    PRAGMA busy_timeout = 5000;
";

/// Make `path` readable and writable by its owner only.
///
/// With `create`, a missing file is created empty at mode 0600 so SQLite
/// never lays it down under the umask; SQLite copies the database file's
/// mode onto its journal and WAL files. Otherwise a missing file is skipped.
#[cfg(unix)]
fn restrict_permissions(path: &Path, create: bool) -> Result<(), LockboxError> {
    use std::fs::{OpenOptions, Permissions};
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    if create && !path.exists() {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(path)?;
    }
    if path.exists() {
        std::fs::set_permissions(path, Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _create: bool) -> Result<(), LockboxError> {
    Ok(())
}

/// The vault database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database at `path` and bring its
    /// schema up to date.
    pub async fn open(path: impl AsRef<Path>, wal_mode: bool) -> Result<Self, LockboxError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        restrict_permissions(&path, true)?;

        // Journal mode is persistent in the file; migrations need a plain
        // synchronous connection.
        let setup_path = path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), LockboxError> {
            let mut conn = rusqlite::Connection::open(&setup_path).map_err(LockboxError::storage)?;
            let journal = if wal_mode { "WAL" } else { "DELETE" };
            conn.pragma_update_and_check(None, "journal_mode", journal, |row| {
                row.get::<_, String>(0)
            })
            .map_err(LockboxError::storage)?;
            conn.execute_batch(CONNECTION_PRAGMAS)
                .map_err(LockboxError::storage)?;
            run_migrations(&mut conn)
        })
        .await
        .map_err(|e| LockboxError::Internal(format!("database setup task failed: {e}")))??;

        for suffix in ["-wal", "-shm", "-journal"] {
            let mut sidecar = path.clone().into_os_string();
            sidecar.push(suffix);
            restrict_permissions(Path::new(&sidecar), false)?;
        }

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(|e| LockboxError::Storage {
                source: Box::new(e),
            })?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(CONNECTION_PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        info!(path = %path.display(), wal_mode, "vault database opened");
        Ok(Self { conn, path })
    }

    /// The shared async connection used by the query modules.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), LockboxError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn
            .close()
            .await
            .map_err(|e| LockboxError::Storage {
                source: e.to_string().into(),
            })?;
        debug!(path = %self.path.display(), "vault database closed");
        Ok(())
    }
}
