// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The vault command surface.
//!
//! [`Vault`] ties the store, the key derivation and the session guard
//! together. Every item operation borrows the session key for its own
//! duration; nothing outside the [`SessionGuard`] keeps a copy.
//!
//! Operations take the gate shared. Rotation, deletion, restore and bulk
//! tag edits take it exclusive, so they never interleave with other writers.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lockbox_config::{KdfProfiles, LockboxConfig};
use lockbox_core::{
    BruteForceConfig, ItemKind, KdfPreset, LockboxError, SortOrder, VaultItem, VaultState,
    types::normalize_tags,
};
use lockbox_storage::queries::{items, meta};
use lockbox_storage::{Database, FailureState, ItemRecord, MoveOutcome, TagRewrite};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::crypto::{self, MasterKey};
use crate::item::{self, ItemUpdate};
use crate::kdf::{self, KdfParams};
use crate::lockout::{self, LockoutStatus};
use crate::record::{self, VaultRecord};
use crate::session::SessionGuard;

pub struct Vault {
    pub(crate) db: Database,
    pub(crate) kdf: KdfProfiles,
    pub(crate) default_preset: KdfPreset,
    pub(crate) default_brute_force: BruteForceConfig,
    pub(crate) session: SessionGuard,
    pub(crate) gate: RwLock<()>,
    /// Held across one whole passphrase check.
    pub(crate) attempts: Mutex<()>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("path", &self.db.path())
            .field("session", &"[REDACTED]")
            .finish()
    }
}

impl Vault {
    /// Open the vault database named by `config` with the system clock.
    pub async fn open(config: &LockboxConfig) -> Result<Self, LockboxError> {
        Self::open_with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn open_with_clock(
        config: &LockboxConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LockboxError> {
        let db = Database::open(&config.storage.database_path, config.storage.wal_mode).await?;
        Ok(Self::from_database(db, config, clock))
    }

    /// Wrap an already opened database.
    pub fn from_database(db: Database, config: &LockboxConfig, clock: Arc<dyn Clock>) -> Self {
        let idle_timeout = match config.vault.auto_lock_minutes {
            0 => None,
            minutes => Some(Duration::from_secs(u64::from(minutes) * 60)),
        };
        Self {
            db,
            kdf: config.vault.kdf.clone(),
            default_preset: config.vault.default_preset,
            default_brute_force: config.brute_force,
            session: SessionGuard::new(idle_timeout, clock.clone()),
            gate: RwLock::new(()),
            attempts: Mutex::new(()),
            clock,
        }
    }

    /// The underlying store.
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn session(&self) -> &SessionGuard {
        &self.session
    }

    /// Lock the session and close the database.
    pub async fn close(self) -> Result<(), LockboxError> {
        self.session.lock().await;
        self.db.close().await
    }

    // --- lifecycle -------------------------------------------------------

    pub async fn is_vault_initialized(&self) -> Result<bool, LockboxError> {
        meta::vault_exists(&self.db).await
    }

    /// Lock state, including any active brute-force lockout.
    pub async fn state(&self) -> Result<VaultState, LockboxError> {
        let Some(record) = VaultRecord::load(&self.db).await? else {
            return Ok(VaultState::Uninitialized);
        };
        if self.session.is_unlocked().await {
            return Ok(VaultState::Unlocked);
        }
        Ok(
            match lockout::evaluate(&record.brute_force, &record.failures, self.clock.now_millis()) {
                LockoutStatus::Active { remaining_secs } => VaultState::LockedOut { remaining_secs },
                LockoutStatus::Clear | LockoutStatus::Expired => VaultState::Locked,
            },
        )
    }

    /// Create the vault record. The vault is left locked.
    pub async fn initialize_vault(
        &self,
        passphrase: &SecretString,
        preset: Option<KdfPreset>,
    ) -> Result<(), LockboxError> {
        require_passphrase(passphrase)?;
        let _gate = self.gate.write().await;
        if meta::vault_exists(&self.db).await? {
            return Err(LockboxError::VaultAlreadyInitialized);
        }

        let preset = preset.unwrap_or(self.default_preset);
        let params = KdfParams::generate(preset, self.kdf.for_preset(preset))?;
        let key = kdf::derive_key_blocking(passphrase, &params).await?;
        let canary = record::seal_canary(&key)?;
        drop(key);

        let created = meta::create_vault_record(
            &self.db,
            serde_json::to_vec(&params)?,
            canary,
            serde_json::to_vec(&self.default_brute_force)?,
        )
        .await?;
        if !created {
            return Err(LockboxError::VaultAlreadyInitialized);
        }
        self.session.lock().await;
        info!(preset = %preset, memory_kib = params.memory_kib, "vault initialized");
        Ok(())
    }

    pub async fn unlock_vault(&self, passphrase: &SecretString) -> Result<(), LockboxError> {
        let _gate = self.gate.read().await;
        let (_, key) = self.verify_passphrase(passphrase).await?;
        self.session.unlock(key).await;
        info!("vault unlocked");
        Ok(())
    }

    pub async fn lock_vault(&self) -> Result<(), LockboxError> {
        if self.session.lock().await {
            info!("vault locked");
        }
        Ok(())
    }

    /// Erase every item and the vault record. Requires the passphrase.
    pub async fn delete_vault(&self, passphrase: &SecretString) -> Result<(), LockboxError> {
        let _gate = self.gate.write().await;
        self.verify_passphrase(passphrase).await?;
        items::wipe_all(&self.db).await?;
        self.session.lock().await;
        warn!("vault deleted");
        Ok(())
    }

    /// Derive a key from `passphrase` and check it against the canary.
    ///
    /// Honours and updates the persisted lockout state, so it backs both
    /// `unlock_vault` and every passphrase confirmation. Checks run one at a
    /// time: each sees the failures recorded by the one before it.
    pub(crate) async fn verify_passphrase(
        &self,
        passphrase: &SecretString,
    ) -> Result<(VaultRecord, MasterKey), LockboxError> {
        require_passphrase(passphrase)?;
        let _attempt = self.attempts.lock().await;
        let mut record = VaultRecord::require(&self.db).await?;
        match lockout::evaluate(&record.brute_force, &record.failures, self.clock.now_millis()) {
            LockoutStatus::Clear => {}
            LockoutStatus::Expired => {
                meta::reset_failures(&self.db).await?;
                record.failures = FailureState::default();
                debug!("lockout window elapsed, failure counter reset");
            }
            LockoutStatus::Active { remaining_secs } => {
                warn!(remaining_secs, "passphrase attempt refused during lockout");
                return Err(LockboxError::LockedOut { remaining_secs });
            }
        }

        let key = kdf::derive_key_blocking(passphrase, &record.params).await?;
        if !record::verify_canary(&key, &record.canary) {
            let failures = meta::record_failure(&self.db, self.clock.now_millis()).await?;
            warn!(
                failed_attempts = failures.failed_attempts,
                max_attempts = record.brute_force.max_attempts,
                "passphrase verification failed"
            );
            return Err(LockboxError::InvalidMasterKey);
        }
        if record.failures.failed_attempts > 0 {
            meta::reset_failures(&self.db).await?;
            record.failures = FailureState::default();
        }
        Ok((record, key))
    }

    // --- lockout settings ------------------------------------------------

    pub async fn get_brute_force_config(&self) -> Result<BruteForceConfig, LockboxError> {
        self.session.key().await?;
        Ok(VaultRecord::require(&self.db).await?.brute_force)
    }

    pub async fn set_brute_force_config(&self, config: BruteForceConfig) -> Result<(), LockboxError> {
        self.session.key().await?;
        if config.enabled && (config.max_attempts == 0 || config.lockout_duration_minutes == 0) {
            return Err(LockboxError::InvalidInput(
                "max_attempts and lockout_duration_minutes must be at least 1".to_string(),
            ));
        }
        let _gate = self.gate.read().await;
        meta::set_brute_force_config(&self.db, serde_json::to_vec(&config)?).await?;
        info!(
            enabled = config.enabled,
            max_attempts = config.max_attempts,
            lockout_duration_minutes = config.lockout_duration_minutes,
            "brute-force settings updated"
        );
        Ok(())
    }

    // --- items -----------------------------------------------------------

    /// Every item in the vault, decrypted, in the default order.
    pub async fn get_all_vault_items(&self) -> Result<Vec<VaultItem>, LockboxError> {
        let _gate = self.gate.read().await;
        let key = self.session.key().await?;
        let mut decrypted = open_all(&key, &items::list_all(&self.db).await?)?;
        SortOrder::default().sort(&mut decrypted);
        Ok(decrypted)
    }

    /// Children of `parent_id` (root when `None`), filtered and sorted.
    pub async fn get_vault_items(
        &self,
        parent_id: Option<&str>,
        type_filter: Option<&str>,
        sort_order: Option<SortOrder>,
    ) -> Result<Vec<VaultItem>, LockboxError> {
        let _gate = self.gate.read().await;
        let key = self.session.key().await?;
        self.require_folder(parent_id).await?;

        let mut listed = open_all(&key, &items::list_children(&self.db, parent_id).await?)?;
        if let Some(filter) = type_filter.map(str::trim).filter(|f| !f.is_empty()) {
            listed.retain(|i| i.kind.matches_filter(i.folder_type.as_deref(), filter));
        }
        sort_order.unwrap_or_default().sort(&mut listed);
        Ok(listed)
    }

    pub async fn add_text_item(
        &self,
        name: &str,
        content: &str,
        mime: &str,
        tags: &[String],
        parent_id: Option<&str>,
    ) -> Result<VaultItem, LockboxError> {
        self.add_with_content(ItemKind::for_text(mime), name, content.as_bytes(), tags, parent_id)
            .await
    }

    /// Read a file from disk and store it encrypted.
    ///
    /// An empty `name` falls back to the file name.
    pub async fn add_file_item(
        &self,
        name: &str,
        file_path: &Path,
        tags: &[String],
        parent_id: Option<&str>,
    ) -> Result<VaultItem, LockboxError> {
        let content = zeroize::Zeroizing::new(tokio::fs::read(file_path).await?);
        let name = match name.trim() {
            "" => file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            given => given.to_string(),
        };
        let kind = ItemKind::File {
            mime: item::mime_for_path(file_path).to_string(),
        };
        self.add_with_content(kind, &name, &content, tags, parent_id).await
    }

    pub async fn add_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
        folder_type: Option<&str>,
    ) -> Result<VaultItem, LockboxError> {
        let _gate = self.gate.read().await;
        let key = self.session.key().await?;
        self.require_folder(parent_id).await?;

        let mut folder = item::new_item(ItemKind::Folder, name, &[], parent_id, self.clock.now())?;
        folder.folder_type = folder_type
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        items::insert_item(&self.db, &item::seal_item(&key, &folder)?, None).await?;
        debug!(id = %folder.id, "folder added");
        Ok(folder)
    }

    pub(crate) async fn add_with_content(
        &self,
        kind: ItemKind,
        name: &str,
        content: &[u8],
        tags: &[String],
        parent_id: Option<&str>,
    ) -> Result<VaultItem, LockboxError> {
        let _gate = self.gate.read().await;
        let key = self.session.key().await?;
        self.require_folder(parent_id).await?;

        let new = item::new_item(kind, name, tags, parent_id, self.clock.now())?;
        let record = item::seal_item(&key, &new)?;
        let envelope = crypto::seal(&key, content)?;
        items::insert_item(&self.db, &record, Some(envelope)).await?;
        debug!(id = %new.id, kind = new.kind.as_str(), bytes = content.len(), "item added");
        Ok(new)
    }

    /// Apply `update` to an item and bump its `updated_at`.
    pub async fn update_item(&self, id: &str, update: ItemUpdate) -> Result<VaultItem, LockboxError> {
        let _gate = self.gate.read().await;
        let key = self.session.key().await?;
        let mut current = item::open_item(&key, &self.require_item(id).await?)?;
        if update.is_empty() {
            return Ok(current);
        }
        if update.content.is_some() && !current.kind.has_content() {
            return Err(LockboxError::InvalidInput("folders have no content".to_string()));
        }

        if let Some(name) = &update.name {
            current.name = item::validate_name(name)?;
        }
        if let Some(comments) = update.comments {
            current.comments = comments.filter(|c| !c.trim().is_empty());
        }
        if let Some(tags) = &update.tags {
            current.tags = normalize_tags(tags);
        }
        current.updated_at = self.clock.now();

        let record = item::seal_item(&key, &current)?;
        let content = update
            .content
            .map(|c| crypto::seal(&key, &zeroize::Zeroizing::new(c)))
            .transpose()?;
        if !items::update_item(&self.db, &record, content).await? {
            return Err(LockboxError::ItemNotFound(id.to_string()));
        }
        debug!(id, "item updated");
        Ok(current)
    }

    /// Re-parent an item. A folder cannot move into itself or its descendants.
    pub async fn move_item(
        &self,
        id: &str,
        new_parent_id: Option<&str>,
    ) -> Result<VaultItem, LockboxError> {
        let _gate = self.gate.read().await;
        let key = self.session.key().await?;
        let mut moved = item::open_item(&key, &self.require_item(id).await?)?;
        self.require_folder(new_parent_id).await?;

        moved.parent_id = new_parent_id.map(str::to_string);
        moved.updated_at = self.clock.now();
        match items::move_item(&self.db, id, new_parent_id, &item::timestamp(moved.updated_at)).await? {
            MoveOutcome::Moved => {}
            MoveOutcome::NotFound => return Err(LockboxError::ItemNotFound(id.to_string())),
            MoveOutcome::WouldCycle => {
                return Err(LockboxError::InvalidInput(
                    "cannot move a folder into itself or one of its descendants".to_string(),
                ));
            }
        }
        debug!(id, "item moved");
        Ok(moved)
    }

    /// Delete an item; a folder takes its whole subtree with it.
    pub async fn delete_item(&self, id: &str) -> Result<(), LockboxError> {
        let _gate = self.gate.write().await;
        self.session.key().await?;
        let removed = items::delete_item(&self.db, id).await?;
        if removed == 0 {
            return Err(LockboxError::ItemNotFound(id.to_string()));
        }
        debug!(id, removed, "item deleted");
        Ok(())
    }

    /// Decrypted content of a non-folder item.
    pub async fn get_item_content(&self, id: &str) -> Result<Vec<u8>, LockboxError> {
        let _gate = self.gate.read().await;
        let key = self.session.key().await?;
        let record = self.require_item(id).await?;
        if record.kind == ItemKind::Folder.as_str() {
            return Err(LockboxError::InvalidInput("folders have no content".to_string()));
        }
        let envelope = items::get_content(&self.db, id)
            .await?
            .ok_or_else(|| LockboxError::ItemNotFound(id.to_string()))?;
        crypto::open(&key, &envelope)
    }

    // --- tags ------------------------------------------------------------

    /// Every distinct tag in use, sorted.
    pub async fn get_all_tags(&self) -> Result<Vec<String>, LockboxError> {
        let _gate = self.gate.read().await;
        let key = self.session.key().await?;
        let mut all = BTreeSet::new();
        for record in items::list_all(&self.db).await? {
            all.extend(item::open_tags(&key, &record.tags)?);
        }
        Ok(all.into_iter().collect())
    }

    /// Replace `old` with `new` on every item carrying `old`.
    pub async fn rename_tag(&self, old: &str, new: &str) -> Result<(), LockboxError> {
        let (old, new) = (old.trim(), new.trim());
        if old.is_empty() || new.is_empty() {
            return Err(LockboxError::InvalidInput("tag names must not be empty".to_string()));
        }
        if old == new {
            return Ok(());
        }
        let changed = self
            .rewrite_tags(|tags| {
                if !tags.iter().any(|t| t == old) {
                    return None;
                }
                Some(normalize_tags(
                    tags.iter().map(|t| if t == old { new } else { t.as_str() }),
                ))
            })
            .await?;
        info!(changed, "tag renamed");
        Ok(())
    }

    /// Remove `name` from every item carrying it.
    pub async fn delete_tag(&self, name: &str) -> Result<(), LockboxError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LockboxError::InvalidInput("tag name must not be empty".to_string()));
        }
        let changed = self
            .rewrite_tags(|tags| {
                tags.iter()
                    .any(|t| t == name)
                    .then(|| tags.iter().filter(|t| *t != name).cloned().collect())
            })
            .await?;
        info!(changed, "tag deleted");
        Ok(())
    }

    /// Decrypt every tag set, apply `edit`, and commit the changed ones together.
    async fn rewrite_tags<F>(&self, edit: F) -> Result<usize, LockboxError>
    where
        F: Fn(&[String]) -> Option<Vec<String>>,
    {
        let _gate = self.gate.write().await;
        let key = self.session.key().await?;
        let updated_at = item::timestamp(self.clock.now());
        let mut rewrites = Vec::new();
        for record in items::list_all(&self.db).await? {
            let tags = item::open_tags(&key, &record.tags)?;
            if let Some(edited) = edit(&tags) {
                rewrites.push(TagRewrite {
                    id: record.id,
                    tags: item::seal_tags(&key, &edited)?,
                    updated_at: updated_at.clone(),
                });
            }
        }
        let changed = rewrites.len();
        if changed > 0 {
            items::rewrite_tags(&self.db, rewrites).await?;
        }
        Ok(changed)
    }

    // --- helpers ---------------------------------------------------------

    pub(crate) async fn require_item(&self, id: &str) -> Result<ItemRecord, LockboxError> {
        items::get_item(&self.db, id)
            .await?
            .ok_or_else(|| LockboxError::ItemNotFound(id.to_string()))
    }

    /// `None` is the root; otherwise the id must name an existing folder.
    pub(crate) async fn require_folder(&self, parent_id: Option<&str>) -> Result<(), LockboxError> {
        let Some(id) = parent_id else {
            return Ok(());
        };
        let record = self.require_item(id).await?;
        if record.kind != ItemKind::Folder.as_str() {
            return Err(LockboxError::InvalidInput(format!("parent {id} is not a folder")));
        }
        Ok(())
    }
}

pub(crate) fn require_passphrase(passphrase: &SecretString) -> Result<(), LockboxError> {
    if passphrase.expose_secret().is_empty() {
        return Err(LockboxError::InvalidInput("passphrase must not be empty".to_string()));
    }
    Ok(())
}

fn open_all(key: &MasterKey, records: &[ItemRecord]) -> Result<Vec<VaultItem>, LockboxError> {
    records.iter().map(|r| item::open_item(key, r)).collect()
}

/// Periodically enforce the idle timeout until `cancel` fires.
pub fn spawn_auto_lock(
    vault: Arc<Vault>,
    period: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    vault.session.expire_if_idle().await;
                }
                _ = cancel.cancelled() => {
                    debug!("auto-lock ticker stopped");
                    break;
                }
            }
        }
    })
}
