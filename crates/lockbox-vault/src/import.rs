// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bulk credential import from password-manager CSV exports.
//!
//! Rows are independent: a malformed row is reported and skipped, every
//! good row is committed on its own. Folder paths are resolved under the
//! import root, reusing existing folders by exact name.

use std::collections::HashMap;

use lockbox_core::{ImportReport, ItemKind, LockboxError};
use lockbox_storage::queries::items;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{self, MasterKey};
use crate::item;
use crate::vault::Vault;

const LOGIN_COLUMNS: &[&str] = &["login", "username", "user", "account", "login_username"];
const SECRET_COLUMNS: &[&str] = &["password", "secret", "login_password"];
const FOLDER_COLUMNS: &[&str] = &["folder", "path", "group"];
const TAG_COLUMNS: &[&str] = &["tags", "tag", "labels"];
const COMMENT_COLUMNS: &[&str] = &["comments", "notes", "note", "extra"];
const SITE_COLUMNS: &[&str] = &["url", "site", "website", "login_uri"];
const NAME_COLUMNS: &[&str] = &["name", "title"];

/// Content of a credential item, stored as JSON. Wiped on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    pub login: String,
    pub secret: String,
    pub site: Option<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("login", &self.login)
            .field("secret", &"[REDACTED]")
            .field("site", &self.site)
            .finish()
    }
}

/// Header positions of the recognised columns.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    login: usize,
    secret: usize,
    folder: Option<usize>,
    tags: Option<usize>,
    comments: Option<usize>,
    site: Option<usize>,
    name: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, LockboxError> {
        let find = |aliases: &[&str]| {
            headers
                .iter()
                .position(|h| aliases.iter().any(|a| h.trim().eq_ignore_ascii_case(a)))
        };
        let missing = |what: &str| {
            LockboxError::InvalidInput(format!("CSV header has no {what} column"))
        };
        Ok(Self {
            login: find(LOGIN_COLUMNS).ok_or_else(|| missing("login"))?,
            secret: find(SECRET_COLUMNS).ok_or_else(|| missing("password"))?,
            folder: find(FOLDER_COLUMNS),
            tags: find(TAG_COLUMNS),
            comments: find(COMMENT_COLUMNS),
            site: find(SITE_COLUMNS),
            name: find(NAME_COLUMNS),
        })
    }
}

/// One well-formed row.
#[derive(Debug)]
struct ImportRow {
    name: String,
    credential: Credential,
    folder_path: Vec<String>,
    tags: Vec<String>,
    comments: Option<String>,
}

impl ImportRow {
    /// Returns the reason a row is unusable as the error.
    fn parse(columns: &ColumnMap, record: &csv::StringRecord) -> Result<Self, String> {
        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let secret = field(Some(columns.secret)).ok_or("empty password")?;
        let login = field(Some(columns.login)).unwrap_or_default();
        let site = field(columns.site);
        let name = field(columns.name)
            .or_else(|| site.clone())
            .or_else(|| (!login.is_empty()).then(|| login.clone()))
            .ok_or("no name, site or login to name the entry")?;

        let folder_path = field(columns.folder)
            .map(|p| {
                p.split('/')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let tags = field(columns.tags)
            .map(|t| t.split([',', ';']).map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            name,
            credential: Credential {
                login,
                secret,
                site,
            },
            folder_path,
            tags,
            comments: field(columns.comments),
        })
    }
}

impl Vault {
    /// Import credentials from `csv_text` under `parent_id`.
    ///
    /// A missing login or password column rejects the whole file. Store
    /// failures stop the import; rows committed before that stay.
    pub async fn import_csv(
        &self,
        csv_text: &str,
        parent_id: Option<&str>,
    ) -> Result<ImportReport, LockboxError> {
        let _gate = self.gate.read().await;
        let key = self.session.key().await?;
        self.require_folder(parent_id).await?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(csv_text.as_bytes());
        let headers = reader
            .headers()
            .map_err(|e| LockboxError::InvalidInput(format!("unreadable CSV header: {e}")))?
            .clone();
        let columns = ColumnMap::from_headers(&headers)?;

        let mut report = ImportReport::default();
        let mut folders = FolderCache::default();
        for (index, record) in reader.records().enumerate() {
            let row_number = index + 1;
            let row = match record {
                Ok(record) => ImportRow::parse(&columns, &record),
                Err(e) => Err(e.to_string()),
            };
            match row {
                Ok(row) => {
                    self.import_row(&key, parent_id, row, &mut folders).await?;
                    report.record_success();
                }
                Err(reason) => {
                    debug!(row = row_number, "skipping malformed CSV row");
                    report.record_error(format!("row {row_number}: {reason}"));
                }
            }
        }

        info!(
            imported = report.success_count,
            failed = report.error_count,
            folders_created = folders.created,
            "CSV import finished"
        );
        Ok(report)
    }

    async fn import_row(
        &self,
        key: &MasterKey,
        root: Option<&str>,
        row: ImportRow,
        folders: &mut FolderCache,
    ) -> Result<(), LockboxError> {
        let mut parent = root.map(str::to_string);
        for segment in &row.folder_path {
            parent = Some(self.resolve_folder(key, parent.as_deref(), segment, folders).await?);
        }

        let now = self.clock.now();
        let mut entry = item::new_item(ItemKind::Key, &row.name, &row.tags, parent.as_deref(), now)?;
        entry.comments = row.comments;
        let content = Zeroizing::new(serde_json::to_vec(&row.credential)?);
        let envelope = crypto::seal(key, &content)?;
        items::insert_item(&self.db, &item::seal_item(key, &entry)?, Some(envelope)).await
    }

    /// Id of the folder `name` under `parent`, created if absent.
    async fn resolve_folder(
        &self,
        key: &MasterKey,
        parent: Option<&str>,
        name: &str,
        folders: &mut FolderCache,
    ) -> Result<String, LockboxError> {
        let cache_key = (parent.map(str::to_string), name.to_string());
        if let Some(id) = folders.ids.get(&cache_key) {
            return Ok(id.clone());
        }

        for record in items::list_child_folders(&self.db, parent).await? {
            // first match in creation order wins
            if crypto::open_string(key, &record.name)? == name {
                folders.ids.insert(cache_key, record.id.clone());
                return Ok(record.id);
            }
        }

        let folder = item::new_item(ItemKind::Folder, name, &[], parent, self.clock.now())?;
        items::insert_item(&self.db, &item::seal_item(key, &folder)?, None).await?;
        folders.created += 1;
        folders.ids.insert(cache_key, folder.id.clone());
        Ok(folder.id)
    }
}

/// Folder ids resolved during one import, keyed by (parent, name).
#[derive(Debug, Default)]
struct FolderCache {
    ids: HashMap<(Option<String>, String), String>,
    created: usize,
}
