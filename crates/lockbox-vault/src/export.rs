// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encrypted archives, decrypted exports and archive restore.
//!
//! An encrypted archive is a gzipped tar holding exactly two entries:
//! `manifest.json` and `vault.db`, a consistent snapshot of the store taken
//! with the SQLite backup API. It carries ciphertext only and is useless
//! without the passphrase.

use std::io::Read;
use std::path::{Path, PathBuf};

use base64::Engine;
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use lockbox_core::{LockboxError, VaultItem};
use lockbox_storage::queries::{items, meta};
use lockbox_storage::snapshot;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::crypto;
use crate::item;
use crate::vault::Vault;

pub const ARCHIVE_FORMAT: &str = "lockbox-archive";
pub const ARCHIVE_VERSION: u32 = 1;
pub const DECRYPTED_FORMAT: &str = "lockbox-decrypted-export";

const MANIFEST_ENTRY: &str = "manifest.json";
const DATABASE_ENTRY: &str = "vault.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub format: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub item_count: u64,
}

/// Plaintext export document.
#[derive(Debug, Serialize)]
struct DecryptedExport {
    format: &'static str,
    exported_at: DateTime<Utc>,
    items: Vec<DecryptedItem>,
}

#[derive(Debug, Serialize)]
struct DecryptedItem {
    #[serde(flatten)]
    item: VaultItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_base64: Option<String>,
}

impl DecryptedItem {
    fn new(item: VaultItem, content: Option<Vec<u8>>) -> Self {
        let (content, content_base64) = match content.map(String::from_utf8) {
            None => (None, None),
            Some(Ok(text)) => (Some(text), None),
            Some(Err(raw)) => (
                None,
                Some(base64::engine::general_purpose::STANDARD.encode(raw.as_bytes())),
            ),
        };
        Self {
            item,
            content,
            content_base64,
        }
    }
}

impl Vault {
    /// Snapshot the store into a `tar.gz` archive. Requires an unlocked session.
    pub async fn export_encrypted_vault(&self) -> Result<Vec<u8>, LockboxError> {
        let _gate = self.gate.read().await;
        self.session.key().await?;

        let staging = tempfile::tempdir()?;
        let snapshot_path = staging.path().join(DATABASE_ENTRY);
        snapshot::backup_to(&self.db, &snapshot_path).await?;

        let created_at = self.clock.now();
        let (archive, item_count) = tokio::task::spawn_blocking(move || {
            let info = snapshot::inspect_snapshot(&snapshot_path)?;
            let manifest = ArchiveManifest {
                format: ARCHIVE_FORMAT.to_string(),
                version: ARCHIVE_VERSION,
                created_at,
                item_count: info.item_count,
            };
            let archive = pack_archive(&manifest, &snapshot_path)?;
            drop(staging);
            Ok::<_, LockboxError>((archive, info.item_count))
        })
        .await
        .map_err(|e| LockboxError::Internal(format!("archive task failed: {e}")))??;

        info!(items = item_count, bytes = archive.len(), "encrypted archive exported");
        Ok(archive)
    }

    /// Every item with its content in plaintext JSON.
    ///
    /// Needs an unlocked session and the passphrase again.
    pub async fn export_decrypted_vault(
        &self,
        passphrase: &SecretString,
    ) -> Result<String, LockboxError> {
        let _gate = self.gate.read().await;
        self.session.key().await?;
        let (_, key) = self.verify_passphrase(passphrase).await?;

        let stored = items::load_all_with_content(&self.db).await?;
        let mut exported = Vec::with_capacity(stored.len());
        for entry in &stored {
            let decrypted = item::open_item(&key, &entry.record)?;
            let content = entry
                .content
                .as_deref()
                .map(|c| crypto::open(&key, c))
                .transpose()?;
            exported.push(DecryptedItem::new(decrypted, content));
        }

        let document = DecryptedExport {
            format: DECRYPTED_FORMAT,
            exported_at: self.clock.now(),
            items: exported,
        };
        let json = serde_json::to_string_pretty(&document)?;
        warn!(items = stored.len(), "decrypted export produced");
        Ok(json)
    }

    /// Replace the store with the contents of an encrypted archive.
    ///
    /// If a vault already exists its passphrase must be given. The session
    /// is locked afterwards; the restored vault opens with its own passphrase.
    pub async fn restore_encrypted_vault(
        &self,
        archive: &[u8],
        current_passphrase: Option<&SecretString>,
    ) -> Result<(), LockboxError> {
        let _gate = self.gate.write().await;
        if meta::vault_exists(&self.db).await? {
            let passphrase = current_passphrase.ok_or_else(|| {
                LockboxError::InvalidInput(
                    "the current passphrase is required to replace an existing vault".to_string(),
                )
            })?;
            self.verify_passphrase(passphrase).await?;
        }

        let staging = tempfile::tempdir()?;
        let dest = staging.path().to_path_buf();
        let bytes = archive.to_vec();
        let (manifest, snapshot_path) = tokio::task::spawn_blocking(
            move || -> Result<(ArchiveManifest, PathBuf), LockboxError> {
                let (manifest, path) = unpack_archive(&bytes, &dest)?;
                let info = snapshot::inspect_snapshot(&path)?;
                if info.item_count != manifest.item_count {
                    return Err(LockboxError::InvalidInput(format!(
                        "archive manifest lists {} items but the database holds {}",
                        manifest.item_count, info.item_count
                    )));
                }
                Ok((manifest, path))
            },
        )
        .await
        .map_err(|e| LockboxError::Internal(format!("archive task failed: {e}")))??;

        snapshot::restore_from(&self.db, &snapshot_path).await?;
        drop(staging);
        self.session.lock().await;
        info!(
            items = manifest.item_count,
            created_at = %manifest.created_at,
            "vault restored from archive"
        );
        Ok(())
    }
}

/// Write `manifest` and the snapshot at `db_path` into a `tar.gz`.
fn pack_archive(manifest: &ArchiveManifest, db_path: &Path) -> Result<Vec<u8>, LockboxError> {
    let manifest_json = serde_json::to_vec_pretty(manifest)?;
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut header = tar::Header::new_gnu();
    header.set_size(manifest_json.len() as u64);
    header.set_mode(0o600);
    header.set_mtime(u64::try_from(manifest.created_at.timestamp()).unwrap_or_default());
    header.set_cksum();
    builder.append_data(&mut header, MANIFEST_ENTRY, manifest_json.as_slice())?;

    let mut db_file = std::fs::File::open(db_path)?;
    builder.append_file(DATABASE_ENTRY, &mut db_file)?;

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

/// Extract an archive into `dest`, returning its manifest and snapshot path.
///
/// Only the two known entry names are accepted.
fn unpack_archive(bytes: &[u8], dest: &Path) -> Result<(ArchiveManifest, PathBuf), LockboxError> {
    let invalid = |e: std::io::Error| LockboxError::InvalidInput(format!("not a vault archive: {e}"));
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut manifest: Option<ArchiveManifest> = None;
    let mut snapshot_path = None;

    for entry in archive.entries().map_err(invalid)? {
        let mut entry = entry.map_err(invalid)?;
        let name = entry.path().map_err(invalid)?.to_string_lossy().into_owned();
        match name.as_str() {
            MANIFEST_ENTRY => {
                let mut raw = Vec::new();
                entry.read_to_end(&mut raw).map_err(invalid)?;
                manifest = Some(serde_json::from_slice(&raw).map_err(|e| {
                    LockboxError::InvalidInput(format!("invalid archive manifest: {e}"))
                })?);
            }
            DATABASE_ENTRY => {
                let target = dest.join(DATABASE_ENTRY);
                entry.unpack(&target).map_err(invalid)?;
                snapshot_path = Some(target);
            }
            other => {
                return Err(LockboxError::InvalidInput(format!(
                    "unexpected archive entry `{other}`"
                )));
            }
        }
    }

    let manifest = manifest
        .ok_or_else(|| LockboxError::InvalidInput(format!("archive has no {MANIFEST_ENTRY}")))?;
    if manifest.format != ARCHIVE_FORMAT || manifest.version != ARCHIVE_VERSION {
        return Err(LockboxError::InvalidInput(format!(
            "unsupported archive {} v{}",
            manifest.format, manifest.version
        )));
    }
    let snapshot_path = snapshot_path
        .ok_or_else(|| LockboxError::InvalidInput(format!("archive has no {DATABASE_ENTRY}")))?;
    Ok((manifest, snapshot_path))
}
