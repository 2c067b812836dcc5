// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the storage, vault, and CLI crates.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::LockboxError;

/// Mime type recorded for credential (`key`) items, whose content is a JSON document.
pub const CREDENTIAL_MIME: &str = "application/json";

/// Mime type used for text items when the caller does not give one.
pub const DEFAULT_TEXT_MIME: &str = "text/plain";

/// What an item is, together with the capabilities that follow from it.
///
/// Folders carry no content. Every other kind has exactly one encrypted
/// content blob and a mime type stored in clear for UI dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    Folder,
    Text { mime: String },
    Key,
    File { mime: String },
}

impl ItemKind {
    /// Kind name as persisted in the `items.kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Folder => "folder",
            ItemKind::Text { .. } => "text",
            ItemKind::Key => "key",
            ItemKind::File { .. } => "file",
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, ItemKind::Folder)
    }

    pub fn has_content(&self) -> bool {
        !self.is_folder()
    }

    /// Mime type of the content blob, `None` for folders.
    pub fn mime(&self) -> Option<&str> {
        match self {
            ItemKind::Folder => None,
            ItemKind::Text { mime } | ItemKind::File { mime } => Some(mime),
            ItemKind::Key => Some(CREDENTIAL_MIME),
        }
    }

    /// Kind for an item created through `add_text_item`.
    ///
    /// The mime `key` (or the credential mime) produces a credential item;
    /// anything else is a text note of that mime.
    pub fn for_text(mime: &str) -> Self {
        let mime = mime.trim();
        match mime {
            "key" | CREDENTIAL_MIME => ItemKind::Key,
            "" => ItemKind::Text {
                mime: DEFAULT_TEXT_MIME.to_string(),
            },
            other => ItemKind::Text {
                mime: other.to_string(),
            },
        }
    }

    /// Rebuild a kind from its persisted columns.
    pub fn from_parts(kind: &str, mime: Option<String>) -> Result<Self, LockboxError> {
        match (kind, mime) {
            ("folder", _) => Ok(ItemKind::Folder),
            ("key", _) => Ok(ItemKind::Key),
            ("text", mime) => Ok(ItemKind::Text {
                mime: mime.unwrap_or_else(|| DEFAULT_TEXT_MIME.to_string()),
            }),
            ("file", Some(mime)) => Ok(ItemKind::File { mime }),
            ("file", None) => Err(LockboxError::Serialization(
                "file item is missing its mime type".to_string(),
            )),
            (other, _) => Err(LockboxError::Serialization(format!(
                "unknown item kind `{other}`"
            ))),
        }
    }

    /// Whether an item of this kind passes a listing type filter.
    ///
    /// Folders match on their `folder_type`; other items match on the kind
    /// name or a mime prefix (`image/` matches `image/png`).
    pub fn matches_filter(&self, folder_type: Option<&str>, filter: &str) -> bool {
        match self {
            ItemKind::Folder => folder_type == Some(filter),
            other => {
                other.as_str() == filter || other.mime().is_some_and(|m| m.starts_with(filter))
            }
        }
    }
}

/// Key-derivation cost preset chosen at initialization or rotation.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum KdfPreset {
    Fast,
    #[default]
    Recommended,
    Paranoid,
}

/// Brute-force lockout settings persisted in the vault record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BruteForceConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub lockout_duration_minutes: u32,
}

impl Default for BruteForceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            lockout_duration_minutes: 5,
        }
    }
}

/// Listing order for `get_vault_items`.
///
/// Folders always come before non-folders; the order applies within each group.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    CreatedDesc,
    CreatedAsc,
    UpdatedDesc,
    UpdatedAsc,
    NameAsc,
    NameDesc,
}

impl SortOrder {
    pub fn compare(&self, a: &VaultItem, b: &VaultItem) -> Ordering {
        match (a.kind.is_folder(), b.kind.is_folder()) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        match self {
            SortOrder::CreatedDesc => b.created_at.cmp(&a.created_at),
            SortOrder::CreatedAsc => a.created_at.cmp(&b.created_at),
            SortOrder::UpdatedDesc => b.updated_at.cmp(&a.updated_at),
            SortOrder::UpdatedAsc => a.updated_at.cmp(&b.updated_at),
            SortOrder::NameAsc => name_sort_key(&a.name).cmp(&name_sort_key(&b.name)),
            SortOrder::NameDesc => name_sort_key(&b.name).cmp(&name_sort_key(&a.name)),
        }
    }

    pub fn sort(&self, items: &mut [VaultItem]) {
        items.sort_by(|a, b| self.compare(a, b));
    }
}

/// Normalized name used for name ordering: URL scheme and `www.` dropped, lowercased.
pub fn name_sort_key(name: &str) -> String {
    name.replace("https://", "")
        .replace("http://", "")
        .replace("www.", "")
        .to_lowercase()
}

/// Normalize a tag list into a set: trimmed, empty entries dropped, deduplicated, sorted.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// A decrypted item as returned to callers. Content is fetched separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultItem {
    pub id: String,
    pub parent_id: Option<String>,
    #[serde(flatten)]
    pub kind: ItemKind,
    pub name: String,
    pub comments: Option<String>,
    pub tags: Vec<String>,
    pub folder_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lock state of the vault as seen by the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VaultState {
    Uninitialized,
    Locked,
    LockedOut { remaining_secs: u64 },
    Unlocked,
}

/// Outcome of a bulk CSV import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
}

impl ImportReport {
    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_error(&mut self, message: String) {
        self.error_count += 1;
        self.errors.push(message);
    }
}
