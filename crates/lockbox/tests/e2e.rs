// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the vault command surface.
//!
//! Each test creates an isolated TestVault with a temp SQLite file, a cheap
//! KDF and a manual clock. Tests are independent and order-insensitive.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use lockbox_core::{BruteForceConfig, ItemKind, KdfPreset, LockboxError, SortOrder, VaultState};
use lockbox_test_utils::TestVault;
use lockbox_vault::{Credential, ItemUpdate, spawn_auto_lock};
use secrecy::SecretString;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

fn secret(s: &str) -> SecretString {
    SecretString::from(s)
}

fn tags(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

// ---- Initialization and unlock ----

#[tokio::test]
async fn test_unlock_accepts_only_the_initial_passphrase() {
    let harness = TestVault::builder().build().await.unwrap();
    let vault = &harness.vault;
    assert!(!vault.is_vault_initialized().await.unwrap());
    assert_eq!(vault.state().await.unwrap(), VaultState::Uninitialized);

    vault
        .initialize_vault(&TestVault::passphrase(), Some(KdfPreset::Fast))
        .await
        .unwrap();
    assert!(vault.is_vault_initialized().await.unwrap());
    assert_eq!(vault.state().await.unwrap(), VaultState::Locked);

    let wrong = vault.unlock_vault(&secret("not the passphrase")).await;
    assert!(matches!(wrong, Err(LockboxError::InvalidMasterKey)));
    assert_eq!(vault.state().await.unwrap(), VaultState::Locked);

    vault.unlock_vault(&TestVault::passphrase()).await.unwrap();
    assert_eq!(vault.state().await.unwrap(), VaultState::Unlocked);

    vault.lock_vault().await.unwrap();
    assert_eq!(vault.state().await.unwrap(), VaultState::Locked);
}

#[tokio::test]
async fn test_initialize_twice_is_rejected() {
    let harness = TestVault::unlocked().await.unwrap();
    let again = harness
        .vault
        .initialize_vault(&secret("another"), None)
        .await;
    assert!(matches!(again, Err(LockboxError::VaultAlreadyInitialized)));
}

#[tokio::test]
async fn test_uninitialized_vault_cannot_unlock() {
    let harness = TestVault::builder().build().await.unwrap();
    let result = harness.vault.unlock_vault(&TestVault::passphrase()).await;
    assert!(matches!(result, Err(LockboxError::VaultNotInitialized)));
}

#[tokio::test]
async fn test_empty_passphrase_is_invalid_input() {
    let harness = TestVault::builder().build().await.unwrap();
    let result = harness.vault.initialize_vault(&secret(""), None).await;
    assert!(matches!(result, Err(LockboxError::InvalidInput(_))));
}

#[tokio::test]
async fn test_locked_vault_refuses_item_operations() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    let note = vault
        .add_text_item("note", "body", "text/plain", &[], None)
        .await
        .unwrap();
    vault.lock_vault().await.unwrap();

    assert!(matches!(
        vault.get_all_vault_items().await,
        Err(LockboxError::VaultLocked)
    ));
    assert!(matches!(
        vault.get_item_content(&note.id).await,
        Err(LockboxError::VaultLocked)
    ));
    assert!(matches!(
        vault.add_folder("f", None, None).await,
        Err(LockboxError::VaultLocked)
    ));
    assert!(matches!(
        vault.import_csv("login,password\na,b\n", None).await,
        Err(LockboxError::VaultLocked)
    ));
}

// ---- Items ----

#[tokio::test]
async fn test_items_round_trip_through_the_store() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;

    let folder = vault.add_folder("Personal", None, Some("documents")).await.unwrap();
    let note = vault
        .add_text_item("Groceries", "milk, eggs", "text/markdown", &tags(&["home"]), Some(&folder.id))
        .await
        .unwrap();
    let key = vault
        .add_text_item("Router", r#"{"login":"admin","secret":"pw","site":null}"#, "key", &[], None)
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("scan.pdf");
    std::fs::write(&file_path, [0x25, 0x50, 0x44, 0x46, 0xff]).unwrap();
    let file = vault
        .add_file_item("", &file_path, &[], Some(&folder.id))
        .await
        .unwrap();

    assert_eq!(note.kind, ItemKind::Text { mime: "text/markdown".to_string() });
    assert_eq!(key.kind, ItemKind::Key);
    assert_eq!(file.name, "scan.pdf");
    assert_eq!(file.kind, ItemKind::File { mime: "application/pdf".to_string() });

    assert_eq!(vault.get_item_content(&note.id).await.unwrap(), b"milk, eggs");
    assert_eq!(
        vault.get_item_content(&file.id).await.unwrap(),
        [0x25, 0x50, 0x44, 0x46, 0xff]
    );
    assert!(matches!(
        vault.get_item_content(&folder.id).await,
        Err(LockboxError::InvalidInput(_))
    ));

    let children = vault.get_vault_items(Some(&folder.id), None, None).await.unwrap();
    assert_eq!(children.len(), 2);
    let root = vault.get_vault_items(None, None, None).await.unwrap();
    assert_eq!(root.len(), 2);
    assert!(root[0].kind.is_folder());
    assert_eq!(root[0].folder_type.as_deref(), Some("documents"));
}

#[tokio::test]
async fn test_missing_parent_and_item_are_not_found() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    assert!(matches!(
        vault.add_text_item("x", "y", "text/plain", &[], Some("nope")).await,
        Err(LockboxError::ItemNotFound(_))
    ));
    assert!(matches!(vault.delete_item("nope").await, Err(LockboxError::ItemNotFound(_))));
    assert!(matches!(
        vault.get_item_content("nope").await,
        Err(LockboxError::ItemNotFound(_))
    ));
}

#[tokio::test]
async fn test_update_item_changes_fields_and_timestamp() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    let note = vault
        .add_text_item("Draft", "v1", "text/plain", &tags(&["a"]), None)
        .await
        .unwrap();

    harness.clock.advance(Duration::from_secs(30));
    let updated = vault
        .update_item(
            &note.id,
            ItemUpdate {
                name: Some("Final".to_string()),
                comments: Some(Some("reviewed".to_string())),
                content: Some(b"v2".to_vec()),
                tags: Some(tags(&["b", "a", "b"])),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Final");
    assert_eq!(updated.comments.as_deref(), Some("reviewed"));
    assert_eq!(updated.tags, ["a", "b"]);
    assert_eq!(updated.created_at, note.created_at);
    assert!(updated.updated_at > note.updated_at);
    assert_eq!(vault.get_item_content(&note.id).await.unwrap(), b"v2");

    let listed = vault.get_all_vault_items().await.unwrap();
    assert_eq!(listed, vec![updated]);
}

#[tokio::test]
async fn test_sort_orders_and_type_filter() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    for name in ["https://www.Zulu.example", "alpha", "Mike"] {
        vault.add_text_item(name, "x", "text/plain", &[], None).await.unwrap();
        harness.clock.advance(Duration::from_secs(1));
    }
    vault.add_text_item("photo", "x", "image/png", &[], None).await.unwrap();
    harness.clock.advance(Duration::from_secs(1));
    vault.add_folder("Folder", None, Some("photos")).await.unwrap();

    let names = |items: Vec<lockbox_core::VaultItem>| items.into_iter().map(|i| i.name).collect::<Vec<_>>();

    let by_name = vault.get_vault_items(None, None, Some(SortOrder::NameAsc)).await.unwrap();
    assert_eq!(names(by_name), ["Folder", "alpha", "Mike", "photo", "https://www.Zulu.example"]);

    let newest = vault.get_vault_items(None, None, None).await.unwrap();
    assert_eq!(names(newest), ["Folder", "photo", "Mike", "alpha", "https://www.Zulu.example"]);

    let images = vault.get_vault_items(None, Some("image/"), None).await.unwrap();
    assert_eq!(names(images), ["photo"]);

    let photo_folders = vault.get_vault_items(None, Some("photos"), None).await.unwrap();
    assert_eq!(names(photo_folders), ["Folder"]);
}

#[tokio::test]
async fn test_move_item_rejects_cycles() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    let outer = vault.add_folder("outer", None, None).await.unwrap();
    let inner = vault.add_folder("inner", Some(&outer.id), None).await.unwrap();
    let note = vault.add_text_item("n", "x", "text/plain", &[], None).await.unwrap();

    let moved = vault.move_item(&note.id, Some(&inner.id)).await.unwrap();
    assert_eq!(moved.parent_id.as_deref(), Some(inner.id.as_str()));

    assert!(matches!(
        vault.move_item(&outer.id, Some(&inner.id)).await,
        Err(LockboxError::InvalidInput(_))
    ));
    assert!(matches!(
        vault.move_item(&outer.id, Some(&outer.id)).await,
        Err(LockboxError::InvalidInput(_))
    ));
    assert!(matches!(
        vault.move_item(&outer.id, Some(&note.id)).await,
        Err(LockboxError::InvalidInput(_))
    ));

    vault.move_item(&inner.id, None).await.unwrap();
    assert_eq!(vault.get_vault_items(None, None, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_deleting_a_folder_cascades() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    let folder = vault.add_folder("F", None, None).await.unwrap();
    let sub = vault.add_folder("G", Some(&folder.id), None).await.unwrap();
    let child = vault
        .add_text_item("I", "inside", "text/plain", &[], Some(&folder.id))
        .await
        .unwrap();
    vault
        .add_text_item("J", "deeper", "text/plain", &[], Some(&sub.id))
        .await
        .unwrap();
    let keep = vault.add_text_item("K", "outside", "text/plain", &[], None).await.unwrap();

    vault.delete_item(&folder.id).await.unwrap();

    let remaining = vault.get_all_vault_items().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, keep.id);
    assert!(matches!(
        vault.get_item_content(&child.id).await,
        Err(LockboxError::ItemNotFound(_))
    ));
}

// ---- Tags ----

#[tokio::test]
async fn test_rename_tag_updates_every_item() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    vault.add_text_item("a", "x", "text/plain", &tags(&["work", "urgent"]), None).await.unwrap();
    vault.add_text_item("b", "x", "text/plain", &tags(&["work"]), None).await.unwrap();
    vault.add_text_item("c", "x", "text/plain", &tags(&["home"]), None).await.unwrap();

    vault.rename_tag("work", "office").await.unwrap();

    let items = vault.get_all_vault_items().await.unwrap();
    assert!(items.iter().all(|i| !i.tags.iter().any(|t| t == "work")));
    assert_eq!(items.iter().filter(|i| i.tags.iter().any(|t| t == "office")).count(), 2);
    assert_eq!(vault.get_all_tags().await.unwrap(), ["home", "office", "urgent"]);
}

#[tokio::test]
async fn test_rename_tag_merges_into_existing_tag() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    let item = vault
        .add_text_item("a", "x", "text/plain", &tags(&["work", "office"]), None)
        .await
        .unwrap();

    vault.rename_tag("work", "office").await.unwrap();

    let items = vault.get_all_vault_items().await.unwrap();
    let renamed = items.iter().find(|i| i.id == item.id).unwrap();
    assert_eq!(renamed.tags, ["office"]);
}

#[tokio::test]
async fn test_delete_tag_removes_it_everywhere() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    vault.add_text_item("a", "x", "text/plain", &tags(&["tmp", "keep"]), None).await.unwrap();
    vault.add_folder("f", None, None).await.unwrap();

    vault.delete_tag("tmp").await.unwrap();
    assert_eq!(vault.get_all_tags().await.unwrap(), ["keep"]);
    assert!(matches!(vault.delete_tag("  ").await, Err(LockboxError::InvalidInput(_))));
}

// ---- Key rotation ----

#[tokio::test]
async fn test_rotation_preserves_every_item() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    let folder = vault.add_folder("Docs", None, None).await.unwrap();
    vault
        .add_text_item("note", "plain body", "text/plain", &tags(&["x", "y"]), Some(&folder.id))
        .await
        .unwrap();
    let commented = vault.add_text_item("c", "z", "text/plain", &[], None).await.unwrap();
    vault
        .update_item(
            &commented.id,
            ItemUpdate {
                comments: Some(Some("remember".to_string())),
                ..ItemUpdate::default()
            },
        )
        .await
        .unwrap();

    let before = vault.get_all_vault_items().await.unwrap();
    let mut contents = BTreeMap::new();
    for item in before.iter().filter(|i| i.kind.has_content()) {
        contents.insert(item.id.clone(), vault.get_item_content(&item.id).await.unwrap());
    }

    let new_passphrase = secret("a brand new passphrase");
    vault
        .update_master_key(&TestVault::passphrase(), &new_passphrase, Some(KdfPreset::Paranoid))
        .await
        .unwrap();
    assert_eq!(vault.state().await.unwrap(), VaultState::Locked);

    assert!(matches!(
        vault.unlock_vault(&TestVault::passphrase()).await,
        Err(LockboxError::InvalidMasterKey)
    ));
    vault.unlock_vault(&new_passphrase).await.unwrap();

    assert_eq!(vault.get_all_vault_items().await.unwrap(), before);
    for (id, content) in contents {
        assert_eq!(vault.get_item_content(&id).await.unwrap(), content);
    }
}

#[tokio::test]
async fn test_rotation_with_wrong_current_passphrase_fails() {
    let harness = TestVault::unlocked().await.unwrap();
    let result = harness
        .vault
        .update_master_key(&secret("wrong"), &secret("new"), None)
        .await;
    assert!(matches!(result, Err(LockboxError::InvalidMasterKey)));
    assert_eq!(harness.vault.state().await.unwrap(), VaultState::Unlocked);
}

#[tokio::test]
async fn test_rotation_aborts_without_partial_commit() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    let good = vault.add_text_item("good", "readable", "text/plain", &[], None).await.unwrap();
    let bad = vault.add_text_item("bad", "doomed", "text/plain", &[], None).await.unwrap();
    harness.corrupt_item_content(&bad.id).await.unwrap();

    let new_passphrase = secret("never applied");
    let result = vault
        .update_master_key(&TestVault::passphrase(), &new_passphrase, None)
        .await;
    assert!(matches!(result, Err(LockboxError::Crypto(_))));

    vault.lock_vault().await.unwrap();
    assert!(matches!(
        vault.unlock_vault(&new_passphrase).await,
        Err(LockboxError::InvalidMasterKey)
    ));
    vault.unlock_vault(&TestVault::passphrase()).await.unwrap();
    assert_eq!(vault.get_item_content(&good.id).await.unwrap(), b"readable");
    assert_eq!(vault.get_all_vault_items().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_rotation_aborts_on_corrupt_name() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    let folder = vault.add_folder("victim", None, None).await.unwrap();
    vault.add_text_item("fine", "x", "text/plain", &[], None).await.unwrap();
    harness.corrupt_item_name(&folder.id).await.unwrap();

    let result = vault
        .update_master_key(&TestVault::passphrase(), &secret("new"), None)
        .await;
    assert!(matches!(result, Err(LockboxError::Crypto(_))));

    vault.lock_vault().await.unwrap();
    vault.unlock_vault(&TestVault::passphrase()).await.unwrap();
}

// ---- Brute-force lockout ----

fn strict_lockout() -> BruteForceConfig {
    BruteForceConfig {
        enabled: true,
        max_attempts: 3,
        lockout_duration_minutes: 5,
    }
}

#[tokio::test]
async fn test_lockout_blocks_correct_passphrase_until_it_expires() {
    let harness = TestVault::builder()
        .with_brute_force(strict_lockout())
        .build()
        .await
        .unwrap();
    let vault = &harness.vault;
    vault.initialize_vault(&TestVault::passphrase(), None).await.unwrap();

    for _ in 0..3 {
        assert!(matches!(
            vault.unlock_vault(&secret("guess")).await,
            Err(LockboxError::InvalidMasterKey)
        ));
    }

    assert!(matches!(
        vault.unlock_vault(&TestVault::passphrase()).await,
        Err(LockboxError::LockedOut { remaining_secs: 300 })
    ));
    assert_eq!(
        vault.state().await.unwrap(),
        VaultState::LockedOut { remaining_secs: 300 }
    );

    harness.clock.advance(Duration::from_secs(299));
    assert!(matches!(
        vault.unlock_vault(&TestVault::passphrase()).await,
        Err(LockboxError::LockedOut { remaining_secs: 1 })
    ));

    harness.clock.advance(Duration::from_secs(1));
    vault.unlock_vault(&TestVault::passphrase()).await.unwrap();
    assert_eq!(vault.state().await.unwrap(), VaultState::Unlocked);
}

#[tokio::test]
async fn test_lockout_survives_restart() {
    let mut harness = TestVault::builder()
        .with_brute_force(strict_lockout())
        .build()
        .await
        .unwrap();
    harness.vault.initialize_vault(&TestVault::passphrase(), None).await.unwrap();
    for _ in 0..3 {
        let _ = harness.vault.unlock_vault(&secret("guess")).await;
    }

    harness.restart().await.unwrap();
    assert!(matches!(
        harness.vault.unlock_vault(&TestVault::passphrase()).await,
        Err(LockboxError::LockedOut { .. })
    ));
}

#[tokio::test]
async fn test_successful_unlock_resets_failure_count() {
    let harness = TestVault::builder()
        .with_brute_force(strict_lockout())
        .build()
        .await
        .unwrap();
    let vault = &harness.vault;
    vault.initialize_vault(&TestVault::passphrase(), None).await.unwrap();

    for _ in 0..2 {
        let _ = vault.unlock_vault(&secret("guess")).await;
    }
    vault.unlock_vault(&TestVault::passphrase()).await.unwrap();
    vault.lock_vault().await.unwrap();
    for _ in 0..2 {
        let _ = vault.unlock_vault(&secret("guess")).await;
    }
    vault.unlock_vault(&TestVault::passphrase()).await.unwrap();
}

#[tokio::test]
async fn test_disabled_lockout_never_blocks() {
    let harness = TestVault::builder()
        .with_brute_force(BruteForceConfig {
            enabled: false,
            ..strict_lockout()
        })
        .build()
        .await
        .unwrap();
    let vault = &harness.vault;
    vault.initialize_vault(&TestVault::passphrase(), None).await.unwrap();
    for _ in 0..10 {
        let _ = vault.unlock_vault(&secret("guess")).await;
    }
    vault.unlock_vault(&TestVault::passphrase()).await.unwrap();
}

#[tokio::test]
async fn test_brute_force_config_round_trips() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    assert_eq!(vault.get_brute_force_config().await.unwrap(), BruteForceConfig::default());

    vault.set_brute_force_config(strict_lockout()).await.unwrap();
    assert_eq!(vault.get_brute_force_config().await.unwrap(), strict_lockout());

    let invalid = BruteForceConfig {
        max_attempts: 0,
        ..strict_lockout()
    };
    assert!(matches!(
        vault.set_brute_force_config(invalid).await,
        Err(LockboxError::InvalidInput(_))
    ));
}

// ---- Auto-lock ----

#[tokio::test]
async fn test_idle_session_auto_locks() {
    let harness = TestVault::builder()
        .with_auto_lock_minutes(1)
        .build()
        .await
        .unwrap();
    harness.initialize_and_unlock().await.unwrap();
    let vault = &harness.vault;

    harness.clock.advance(Duration::from_secs(50));
    vault.get_all_vault_items().await.unwrap();
    harness.clock.advance(Duration::from_secs(50));
    vault.get_all_vault_items().await.unwrap();

    harness.clock.advance(Duration::from_secs(60));
    assert!(matches!(
        vault.get_all_vault_items().await,
        Err(LockboxError::VaultLocked)
    ));
    assert_eq!(vault.state().await.unwrap(), VaultState::Locked);
}

#[tokio::test]
async fn test_auto_lock_ticker_drops_idle_key() {
    let harness = TestVault::builder()
        .with_auto_lock_minutes(1)
        .build()
        .await
        .unwrap();
    harness.initialize_and_unlock().await.unwrap();

    let cancel = CancellationToken::new();
    let ticker = spawn_auto_lock(harness.vault.clone(), Duration::from_millis(10), cancel.clone());
    harness.clock.advance(Duration::from_secs(61));
    tokio::time::sleep(Duration::from_millis(100)).await;

    // lock() reports whether a key was still held
    assert!(!harness.vault.session().lock().await);

    cancel.cancel();
    ticker.await.unwrap();
}

// ---- CSV import ----

const TEN_ROW_CSV: &str = "\
name,url,username,password,folder,tags,notes
Gmail,https://mail.google.com,alice@gmail.com,pw1,Email/Personal,\"mail,personal\",primary
Outlook,https://outlook.com,alice@outlook.com,pw2,Email/Personal,mail,
Work mail,,alice@corp.example,pw3,Email/Work,work;mail,
Bank,https://bank.example,alice,pw4,Finance,,
Broken,https://x.example,bob,,Finance,,
GitHub,https://github.com,alice-gh,pw6,,dev,
short,row
,https://news.example,reader,pw8,,,
Shop,https://shop.example,alice,pw9,Email/Personal,,
VPN,,alice,pw10,,work,
";

#[tokio::test]
async fn test_csv_import_isolates_malformed_rows() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;

    let report = vault.import_csv(TEN_ROW_CSV, None).await.unwrap();
    assert_eq!(report.success_count, 8);
    assert_eq!(report.error_count, 2);
    assert!(report.errors[0].starts_with("row 5:"));
    assert!(report.errors[1].starts_with("row 7:"));

    let all = vault.get_all_vault_items().await.unwrap();
    let credentials: Vec<_> = all.iter().filter(|i| i.kind == ItemKind::Key).collect();
    assert_eq!(credentials.len(), 8);

    // exactly one Email/Personal chain, plus Email/Work and Finance
    let folders: Vec<_> = all.iter().filter(|i| i.kind.is_folder()).collect();
    assert_eq!(folders.len(), 4);
    let email: Vec<_> = folders.iter().filter(|f| f.name == "Email").collect();
    assert_eq!(email.len(), 1);
    assert_eq!(email[0].parent_id, None);
    let personal: Vec<_> = folders.iter().filter(|f| f.name == "Personal").collect();
    assert_eq!(personal.len(), 1);
    assert_eq!(personal[0].parent_id.as_deref(), Some(email[0].id.as_str()));

    let in_personal = vault
        .get_vault_items(Some(&personal[0].id), None, Some(SortOrder::NameAsc))
        .await
        .unwrap();
    let names: Vec<_> = in_personal.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["Gmail", "Outlook", "Shop"]);

    let gmail = in_personal.iter().find(|i| i.name == "Gmail").unwrap();
    assert_eq!(gmail.tags, ["mail", "personal"]);
    assert_eq!(gmail.comments.as_deref(), Some("primary"));
    let content: Credential =
        serde_json::from_slice(&vault.get_item_content(&gmail.id).await.unwrap()).unwrap();
    assert_eq!(
        content,
        Credential {
            login: "alice@gmail.com".to_string(),
            secret: "pw1".to_string(),
            site: Some("https://mail.google.com".to_string()),
        }
    );

    let unnamed = credentials.iter().find(|i| i.name == "https://news.example");
    assert!(unnamed.is_some());
}

#[tokio::test]
async fn test_csv_import_reuses_existing_folders() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    let existing = vault.add_folder("Email", None, None).await.unwrap();

    vault.import_csv(TEN_ROW_CSV, None).await.unwrap();
    vault.import_csv(TEN_ROW_CSV, None).await.unwrap();

    let roots = vault.get_vault_items(None, None, None).await.unwrap();
    let email: Vec<_> = roots.iter().filter(|i| i.name == "Email").collect();
    assert_eq!(email.len(), 1);
    assert_eq!(email[0].id, existing.id);
}

#[tokio::test]
async fn test_csv_without_password_column_is_rejected() {
    let harness = TestVault::unlocked().await.unwrap();
    let result = harness.vault.import_csv("name,username\nx,y\n", None).await;
    assert!(matches!(result, Err(LockboxError::InvalidInput(_))));
    assert!(harness.vault.get_all_vault_items().await.unwrap().is_empty());
}

// ---- Export and restore ----

#[tokio::test]
async fn test_encrypted_archive_restores_into_fresh_vault() {
    let source = TestVault::unlocked().await.unwrap();
    let folder = source.vault.add_folder("Docs", None, None).await.unwrap();
    let note = source
        .vault
        .add_text_item("note", "carried over", "text/plain", &tags(&["t"]), Some(&folder.id))
        .await
        .unwrap();
    let archive = source.vault.export_encrypted_vault().await.unwrap();
    assert!(!archive.windows(b"carried over".len()).any(|w| w == b"carried over"));

    let target = TestVault::builder().build().await.unwrap();
    target.vault.restore_encrypted_vault(&archive, None).await.unwrap();
    assert_eq!(target.vault.state().await.unwrap(), VaultState::Locked);

    target.vault.unlock_vault(&TestVault::passphrase()).await.unwrap();
    assert_eq!(
        target.vault.get_all_vault_items().await.unwrap(),
        source.vault.get_all_vault_items().await.unwrap()
    );
    assert_eq!(
        target.vault.get_item_content(&note.id).await.unwrap(),
        b"carried over"
    );
}

#[tokio::test]
async fn test_restore_over_existing_vault_needs_its_passphrase() {
    let source = TestVault::unlocked().await.unwrap();
    let archive = source.vault.export_encrypted_vault().await.unwrap();

    let target = TestVault::unlocked().await.unwrap();
    target.vault.add_text_item("old", "x", "text/plain", &[], None).await.unwrap();

    assert!(matches!(
        target.vault.restore_encrypted_vault(&archive, None).await,
        Err(LockboxError::InvalidInput(_))
    ));
    assert!(matches!(
        target.vault.restore_encrypted_vault(b"garbage", Some(&TestVault::passphrase())).await,
        Err(LockboxError::InvalidInput(_))
    ));

    target
        .vault
        .restore_encrypted_vault(&archive, Some(&TestVault::passphrase()))
        .await
        .unwrap();
    target.vault.unlock_vault(&TestVault::passphrase()).await.unwrap();
    assert!(target.vault.get_all_vault_items().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_decrypted_export_requires_passphrase() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    vault.add_text_item("note", "hello", "text/plain", &tags(&["t"]), None).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("blob.bin");
    std::fs::write(&bin, [0xff, 0xfe, 0x00]).unwrap();
    vault.add_file_item("blob", &bin, &[], None).await.unwrap();

    assert!(matches!(
        vault.export_decrypted_vault(&secret("wrong")).await,
        Err(LockboxError::InvalidMasterKey)
    ));

    let json = vault.export_decrypted_vault(&TestVault::passphrase()).await.unwrap();
    let document: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(document["format"], "lockbox-decrypted-export");
    let items = document["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    let note = items.iter().find(|i| i["name"] == "note").unwrap();
    assert_eq!(note["content"], "hello");
    assert_eq!(note["tags"][0], "t");
    let blob = items.iter().find(|i| i["name"] == "blob").unwrap();
    assert_eq!(blob["content_base64"], "//4A");
}

#[tokio::test]
async fn test_decrypted_export_refused_while_locked() {
    let harness = TestVault::unlocked().await.unwrap();
    harness.vault.lock_vault().await.unwrap();
    assert!(matches!(
        harness.vault.export_decrypted_vault(&TestVault::passphrase()).await,
        Err(LockboxError::VaultLocked)
    ));
}

// ---- Vault deletion ----

#[tokio::test]
async fn test_delete_vault_wipes_everything() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    vault.add_text_item("a", "x", "text/plain", &[], None).await.unwrap();

    assert!(matches!(
        vault.delete_vault(&secret("wrong")).await,
        Err(LockboxError::InvalidMasterKey)
    ));
    assert!(vault.is_vault_initialized().await.unwrap());

    vault.delete_vault(&TestVault::passphrase()).await.unwrap();
    assert!(!vault.is_vault_initialized().await.unwrap());
    assert_eq!(vault.state().await.unwrap(), VaultState::Uninitialized);

    vault.initialize_vault(&secret("fresh start"), None).await.unwrap();
    vault.unlock_vault(&secret("fresh start")).await.unwrap();
    assert!(vault.get_all_vault_items().await.unwrap().is_empty());
}

// ---- Concurrent access ----

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_guesses_stop_at_max_attempts() {
    let harness = TestVault::builder()
        .with_brute_force(strict_lockout())
        .build()
        .await
        .unwrap();
    harness
        .vault
        .initialize_vault(&TestVault::passphrase(), None)
        .await
        .unwrap();

    let mut guesses = JoinSet::new();
    for n in 0..12 {
        let vault = Arc::clone(&harness.vault);
        guesses.spawn(async move { vault.unlock_vault(&secret(&format!("guess{n}"))).await });
    }

    let (mut rejected, mut locked_out) = (0, 0);
    while let Some(outcome) = guesses.join_next().await {
        match outcome.unwrap() {
            Err(LockboxError::InvalidMasterKey) => rejected += 1,
            Err(LockboxError::LockedOut { .. }) => locked_out += 1,
            other => panic!("unexpected unlock outcome: {other:?}"),
        }
    }
    assert_eq!(rejected, 3);
    assert_eq!(locked_out, 9);

    assert!(matches!(
        harness.vault.unlock_vault(&TestVault::passphrase()).await,
        Err(LockboxError::LockedOut { remaining_secs: 300 })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_crossing_moves_never_form_a_loop() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;

    for trial in 0..20 {
        let a = vault.add_folder(&format!("a{trial}"), None, None).await.unwrap();
        let b = vault.add_folder(&format!("b{trial}"), None, None).await.unwrap();

        let a_into_b = {
            let (vault, a, b) = (Arc::clone(vault), a.id.clone(), b.id.clone());
            tokio::spawn(async move { vault.move_item(&a, Some(&b)).await })
        };
        let b_into_a = {
            let (vault, a, b) = (Arc::clone(vault), a.id.clone(), b.id.clone());
            tokio::spawn(async move { vault.move_item(&b, Some(&a)).await })
        };
        let outcomes = [a_into_b.await.unwrap(), b_into_a.await.unwrap()];

        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1, "trial {trial}");
        assert!(
            outcomes
                .iter()
                .any(|o| matches!(o, Err(LockboxError::InvalidInput(_)))),
            "trial {trial}"
        );

        let at_root: Vec<_> = vault
            .get_vault_items(None, None, None)
            .await
            .unwrap()
            .into_iter()
            .filter(|item| item.id == a.id || item.id == b.id)
            .collect();
        assert_eq!(at_root.len(), 1, "trial {trial}");
        let nested = vault
            .get_vault_items(Some(&at_root[0].id), None, None)
            .await
            .unwrap();
        assert_eq!(nested.len(), 1, "trial {trial}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_rotation_half_done() {
    let harness = TestVault::unlocked().await.unwrap();
    let vault = &harness.vault;
    let mut notes = Vec::new();
    for n in 0..8 {
        let body = format!("body of note {n}");
        let note = vault.add_text_item(&format!("n{n}"), &body, "text/plain", &[], None).await.unwrap();
        notes.push((note.id, body.into_bytes()));
    }

    let mut readers = JoinSet::new();
    for round in 0..6 {
        for (id, body) in notes.clone() {
            let vault = Arc::clone(vault);
            readers.spawn(async move {
                if round % 2 == 1 {
                    tokio::task::yield_now().await;
                }
                (vault.get_item_content(&id).await, body)
            });
        }
    }
    let rotation = {
        let vault = Arc::clone(vault);
        tokio::spawn(async move {
            vault
                .update_master_key(&TestVault::passphrase(), &secret("rotated while reading"), None)
                .await
        })
    };

    while let Some(joined) = readers.join_next().await {
        match joined.unwrap() {
            (Ok(content), body) => assert_eq!(content, body),
            (Err(LockboxError::VaultLocked), _) => {}
            (Err(other), _) => panic!("reader saw a partial rotation: {other:?}"),
        }
    }
    rotation.await.unwrap().unwrap();

    vault.unlock_vault(&secret("rotated while reading")).await.unwrap();
    for (id, body) in notes {
        assert_eq!(vault.get_item_content(&id).await.unwrap(), body);
    }
}
