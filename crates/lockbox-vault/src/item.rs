// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion between decrypted [`VaultItem`]s and stored [`ItemRecord`]s.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use lockbox_core::{ItemKind, LockboxError, VaultItem, types::normalize_tags};
use lockbox_storage::ItemRecord;

use crate::crypto::{self, MasterKey};

/// Changes applied by `update_item`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub name: Option<String>,
    /// `Some(None)` clears the comments.
    pub comments: Option<Option<String>>,
    pub content: Option<Vec<u8>>,
    pub tags: Option<Vec<String>>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.comments.is_none() && self.content.is_none() && self.tags.is_none()
    }
}

/// Storage form of a timestamp: RFC 3339, milliseconds, `Z`.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, LockboxError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| LockboxError::Serialization(format!("bad timestamp `{raw}`: {e}")))
}

/// Trimmed, non-empty item name.
pub(crate) fn validate_name(name: &str) -> Result<String, LockboxError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LockboxError::InvalidInput("name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

pub(crate) fn seal_tags(key: &MasterKey, tags: &[String]) -> Result<Vec<u8>, LockboxError> {
    crypto::seal(key, &serde_json::to_vec(tags)?)
}

pub(crate) fn open_tags(key: &MasterKey, stored: &[u8]) -> Result<Vec<String>, LockboxError> {
    let raw = crypto::open(key, stored)?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Encrypt a new item's display fields into a storage row.
pub(crate) fn seal_item(key: &MasterKey, item: &VaultItem) -> Result<ItemRecord, LockboxError> {
    Ok(ItemRecord {
        id: item.id.clone(),
        parent_id: item.parent_id.clone(),
        kind: item.kind.as_str().to_string(),
        content_mime: item.kind.mime().map(str::to_string),
        folder_type: item.folder_type.clone(),
        name: crypto::seal(key, item.name.as_bytes())?,
        comments: item
            .comments
            .as_deref()
            .map(|c| crypto::seal(key, c.as_bytes()))
            .transpose()?,
        tags: seal_tags(key, &item.tags)?,
        created_at: timestamp(item.created_at),
        updated_at: timestamp(item.updated_at),
    })
}

/// Decrypt a storage row into the caller-facing item.
pub(crate) fn open_item(key: &MasterKey, record: &ItemRecord) -> Result<VaultItem, LockboxError> {
    Ok(VaultItem {
        id: record.id.clone(),
        parent_id: record.parent_id.clone(),
        kind: ItemKind::from_parts(&record.kind, record.content_mime.clone())?,
        name: crypto::open_string(key, &record.name)?,
        comments: record
            .comments
            .as_deref()
            .map(|c| crypto::open_string(key, c))
            .transpose()?,
        tags: open_tags(key, &record.tags)?,
        folder_type: record.folder_type.clone(),
        created_at: parse_timestamp(&record.created_at)?,
        updated_at: parse_timestamp(&record.updated_at)?,
    })
}

/// A new item with a fresh id, created now.
pub(crate) fn new_item(
    kind: ItemKind,
    name: &str,
    tags: &[String],
    parent_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<VaultItem, LockboxError> {
    Ok(VaultItem {
        id: uuid::Uuid::new_v4().to_string(),
        parent_id: parent_id.map(str::to_string),
        kind,
        name: validate_name(name)?,
        comments: None,
        tags: normalize_tags(tags),
        folder_type: None,
        created_at: now,
        updated_at: now,
    })
}

/// Mime type for an imported file, by extension.
pub(crate) fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "text" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}
