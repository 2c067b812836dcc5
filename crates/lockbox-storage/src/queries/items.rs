// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Item and folder operations on `items` / `item_content`.
//!
//! Each mutating function runs as one transaction.

use lockbox_core::LockboxError;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::{ItemRecord, MoveOutcome, ReencryptedItem, StoredItem, TagRewrite, meta_keys};

const ITEM_COLUMNS: &str = "id, parent_id, kind, content_mime, folder_type, name, comments, tags, created_at, updated_at";

fn item_from_row(row: &Row<'_>) -> Result<ItemRecord, rusqlite::Error> {
    Ok(ItemRecord {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        kind: row.get(2)?,
        content_mime: row.get(3)?,
        folder_type: row.get(4)?,
        name: row.get(5)?,
        comments: row.get(6)?,
        tags: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Insert an item and, for non-folders, its content envelope.
pub async fn insert_item(
    db: &Database,
    record: &ItemRecord,
    content: Option<Vec<u8>>,
) -> Result<(), LockboxError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO items (id, parent_id, kind, content_mime, folder_type, name, comments, tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.id,
                    record.parent_id,
                    record.kind,
                    record.content_mime,
                    record.folder_type,
                    record.name,
                    record.comments,
                    record.tags,
                    record.created_at,
                    record.updated_at,
                ],
            )?;
            if let Some(envelope) = content {
                tx.execute(
                    "INSERT INTO item_content (item_id, envelope) VALUES (?1, ?2)",
                    params![record.id, envelope],
                )?;
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one item row.
pub async fn get_item(db: &Database, id: &str) -> Result<Option<ItemRecord>, LockboxError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<ItemRecord>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
                params![id],
                item_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Every item row, in creation order.
pub async fn list_all(db: &Database) -> Result<Vec<ItemRecord>, LockboxError> {
    db.connection()
        .call(|conn| -> Result<Vec<ItemRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM items ORDER BY created_at, rowid"
            ))?;
            let rows = stmt.query_map([], item_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Direct children of `parent_id` (`None` lists the root), in creation order.
pub async fn list_children(
    db: &Database,
    parent_id: Option<&str>,
) -> Result<Vec<ItemRecord>, LockboxError> {
    let parent_id = parent_id.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<Vec<ItemRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM items WHERE parent_id IS ?1 ORDER BY created_at, rowid"
            ))?;
            let rows = stmt.query_map(params![parent_id], item_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Child folders of `parent_id` whose kind is folder, in creation order.
pub async fn list_child_folders(
    db: &Database,
    parent_id: Option<&str>,
) -> Result<Vec<ItemRecord>, LockboxError> {
    let parent_id = parent_id.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<Vec<ItemRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM items
                 WHERE parent_id IS ?1 AND kind = 'folder'
                 ORDER BY created_at, rowid"
            ))?;
            let rows = stmt.query_map(params![parent_id], item_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Content envelope of an item.
pub async fn get_content(db: &Database, id: &str) -> Result<Option<Vec<u8>>, LockboxError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Vec<u8>>, rusqlite::Error> {
            conn.query_row(
                "SELECT envelope FROM item_content WHERE item_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Every item with its content envelope, read in one transaction.
pub async fn load_all_with_content(db: &Database) -> Result<Vec<StoredItem>, LockboxError> {
    db.connection()
        .call(|conn| -> Result<Vec<StoredItem>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let items = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {ITEM_COLUMNS}, c.envelope FROM items
                     LEFT JOIN item_content c ON c.item_id = items.id
                     ORDER BY created_at, items.rowid"
                ))?;
                let rows = stmt.query_map([], |row| {
                    Ok(StoredItem {
                        record: item_from_row(row)?,
                        content: row.get(10)?,
                    })
                })?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            tx.commit()?;
            Ok(items)
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite an item's mutable fields, and its content when `content` is set.
///
/// Returns `false` if the item does not exist.
pub async fn update_item(
    db: &Database,
    record: &ItemRecord,
    content: Option<Vec<u8>>,
) -> Result<bool, LockboxError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE items SET name = ?2, comments = ?3, tags = ?4, content_mime = ?5, updated_at = ?6
                 WHERE id = ?1",
                params![
                    record.id,
                    record.name,
                    record.comments,
                    record.tags,
                    record.content_mime,
                    record.updated_at,
                ],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            if let Some(envelope) = content {
                tx.execute(
                    "INSERT INTO item_content (item_id, envelope) VALUES (?1, ?2)
                     ON CONFLICT(item_id) DO UPDATE SET envelope = excluded.envelope",
                    params![record.id, envelope],
                )?;
            }
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// Whether `?1` is `?2` or lies somewhere beneath it.
const ANCESTRY_QUERY: &str = "WITH RECURSIVE chain(id, parent_id) AS (
         SELECT id, parent_id FROM items WHERE id = ?1
         UNION
         SELECT i.id, i.parent_id FROM items i JOIN chain c ON i.id = c.parent_id
     )
     SELECT EXISTS(SELECT 1 FROM chain WHERE id = ?2)";

/// Re-parent an item.
///
/// The ancestry check and the update share one transaction, so two
/// crossing moves cannot both commit and close a loop.
pub async fn move_item(
    db: &Database,
    id: &str,
    parent_id: Option<&str>,
    updated_at: &str,
) -> Result<MoveOutcome, LockboxError> {
    let id = id.to_string();
    let parent_id = parent_id.map(str::to_string);
    let updated_at = updated_at.to_string();
    db.connection()
        .call(move |conn| -> Result<MoveOutcome, rusqlite::Error> {
            let tx = conn.transaction()?;
            if let Some(parent) = parent_id.as_deref() {
                let cycle: bool =
                    tx.query_row(ANCESTRY_QUERY, params![parent, id], |row| row.get(0))?;
                if cycle {
                    return Ok(MoveOutcome::WouldCycle);
                }
            }
            let changed = tx.execute(
                "UPDATE items SET parent_id = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, parent_id, updated_at],
            )?;
            tx.commit()?;
            Ok(if changed > 0 {
                MoveOutcome::Moved
            } else {
                MoveOutcome::NotFound
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Delete an item and everything beneath it.
///
/// Returns how many items were removed, 0 if `id` did not exist.
pub async fn delete_item(db: &Database, id: &str) -> Result<usize, LockboxError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            let tx = conn.transaction()?;
            let subtree: i64 = tx.query_row(
                "WITH RECURSIVE subtree(id) AS (
                     SELECT id FROM items WHERE id = ?1
                     UNION
                     SELECT i.id FROM items i JOIN subtree s ON i.parent_id = s.id
                 )
                 SELECT COUNT(*) FROM subtree",
                params![id],
                |row| row.get(0),
            )?;
            tx.execute("DELETE FROM items WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(usize::try_from(subtree).unwrap_or_default())
        })
        .await
        .map_err(map_tr_err)
}

/// Replace the tag envelopes of several items at once.
pub async fn rewrite_tags(db: &Database, rewrites: Vec<TagRewrite>) -> Result<(), LockboxError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare("UPDATE items SET tags = ?2, updated_at = ?3 WHERE id = ?1")?;
                for rewrite in &rewrites {
                    stmt.execute(params![rewrite.id, rewrite.tags, rewrite.updated_at])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Commit a full re-encryption: every item's envelopes plus the new KDF
/// parameters and canary, in a single transaction.
///
/// Fails (and rolls back) if any listed item no longer exists.
pub async fn commit_rotation(
    db: &Database,
    items: Vec<ReencryptedItem>,
    kdf_params: Vec<u8>,
    canary: Vec<u8>,
) -> Result<(), LockboxError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            {
                let mut item_stmt = tx.prepare(
                    "UPDATE items SET name = ?2, comments = ?3, tags = ?4 WHERE id = ?1",
                )?;
                let mut content_stmt =
                    tx.prepare("UPDATE item_content SET envelope = ?2 WHERE item_id = ?1")?;
                for item in &items {
                    if item_stmt.execute(params![item.id, item.name, item.comments, item.tags])? != 1 {
                        return Err(rusqlite::Error::QueryReturnedNoRows);
                    }
                    if let Some(content) = &item.content {
                        content_stmt.execute(params![item.id, content])?;
                    }
                }
                let mut meta_stmt = tx.prepare("UPDATE vault_meta SET value = ?2 WHERE key = ?1")?;
                meta_stmt.execute(params![meta_keys::KDF_PARAMS, kdf_params])?;
                meta_stmt.execute(params![meta_keys::CANARY, canary])?;
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Remove every item and the vault record.
pub async fn wipe_all(db: &Database) -> Result<(), LockboxError> {
    db.connection()
        .call(|conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute_batch(
                "DELETE FROM item_content;
                 DELETE FROM items;
                 DELETE FROM vault_meta;",
            )?;
            tx.commit()?;
            conn.execute_batch("VACUUM;")
        })
        .await
        .map_err(map_tr_err)
}
