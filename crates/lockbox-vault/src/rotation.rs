// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master key rotation.
//!
//! Every envelope is opened with the old key and sealed with the new one in
//! memory first. Only when all of them succeeded is the result committed,
//! together with the new KDF parameters and canary, in one transaction.

use lockbox_core::{KdfPreset, LockboxError};
use lockbox_storage::queries::items;
use lockbox_storage::{ReencryptedItem, StoredItem};
use secrecy::SecretString;
use tracing::{error, info};
use zeroize::Zeroizing;

use crate::crypto::{self, MasterKey};
use crate::kdf::{self, KdfParams};
use crate::record;
use crate::vault::{Vault, require_passphrase};

impl Vault {
    /// Re-key the vault under `new_passphrase`. The session is locked afterwards.
    pub async fn update_master_key(
        &self,
        current_passphrase: &SecretString,
        new_passphrase: &SecretString,
        preset: Option<KdfPreset>,
    ) -> Result<(), LockboxError> {
        require_passphrase(new_passphrase)?;
        let _gate = self.gate.write().await;
        let (_, old_key) = self.verify_passphrase(current_passphrase).await?;

        let preset = preset.unwrap_or(self.default_preset);
        let params = KdfParams::generate(preset, self.kdf.for_preset(preset))?;
        let new_key = kdf::derive_key_blocking(new_passphrase, &params).await?;

        let stored = items::load_all_with_content(&self.db).await?;
        let reencrypted = reencrypt_items(&old_key, &new_key, &stored).inspect_err(|e| {
            error!(error = %e, "key rotation aborted before commit, vault unchanged");
        })?;
        let count = reencrypted.len();
        let canary = record::seal_canary(&new_key)?;

        items::commit_rotation(&self.db, reencrypted, serde_json::to_vec(&params)?, canary)
            .await
            .inspect_err(|e| error!(error = %e, "key rotation commit failed, rolled back"))?;

        self.session.lock().await;
        info!(items = count, preset = %preset, "master key rotated");
        Ok(())
    }
}

/// Open every envelope of `stored` with `old` and seal it with `new`.
///
/// Fails on the first envelope that does not authenticate.
pub(crate) fn reencrypt_items(
    old: &MasterKey,
    new: &MasterKey,
    stored: &[StoredItem],
) -> Result<Vec<ReencryptedItem>, LockboxError> {
    stored
        .iter()
        .map(|item| {
            let record = &item.record;
            Ok(ReencryptedItem {
                id: record.id.clone(),
                name: reseal(old, new, &record.name)?,
                comments: record
                    .comments
                    .as_deref()
                    .map(|c| reseal(old, new, c))
                    .transpose()?,
                tags: reseal(old, new, &record.tags)?,
                content: item
                    .content
                    .as_deref()
                    .map(|c| reseal(old, new, c))
                    .transpose()?,
            })
        })
        .collect()
}

fn reseal(old: &MasterKey, new: &MasterKey, stored: &[u8]) -> Result<Vec<u8>, LockboxError> {
    let plaintext = Zeroizing::new(crypto::open(old, stored)?);
    crypto::seal(new, &plaintext)
}
