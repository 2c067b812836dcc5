// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand implementations.

use std::io::{Read, Write};

use lockbox_config::LockboxConfig;
use lockbox_core::{BruteForceConfig, LockboxError};
use lockbox_vault::{ItemUpdate, Vault};
use secrecy::SecretString;
use tracing::debug;
use zeroize::Zeroizing;

use crate::Commands;
use crate::status;

/// Dispatch one subcommand.
pub async fn run(command: Commands, config: &LockboxConfig) -> Result<(), LockboxError> {
    debug!(path = %config.storage.database_path, "opening vault");
    let vault = Vault::open(config).await?;
    let result = dispatch(command, &vault).await;
    vault.close().await?;
    result
}

async fn dispatch(command: Commands, vault: &Vault) -> Result<(), LockboxError> {
    match command {
        Commands::Init { preset } => {
            let passphrase = lockbox_vault::read_new_passphrase()?;
            vault.initialize_vault(&passphrase, preset).await?;
            eprintln!("Vault created. Unlock it with the same passphrase.");
        }
        Commands::Status { plain } => {
            let state = vault.state().await?;
            status::print_state(vault.database().path(), state, plain);
        }
        Commands::Ls {
            parent,
            type_filter,
            sort,
            all,
        } => {
            unlock(vault).await?;
            let listed = if all {
                vault.get_all_vault_items().await?
            } else {
                vault
                    .get_vault_items(parent.as_deref(), type_filter.as_deref(), sort)
                    .await?
            };
            status::print_items(&listed);
        }
        Commands::AddText {
            name,
            content,
            mime,
            tags,
            parent,
        } => {
            let content = match content {
                Some(content) => content,
                None => read_stdin()?,
            };
            unlock(vault).await?;
            let added = vault
                .add_text_item(&name, &content, &mime, &tags, parent.as_deref())
                .await?;
            println!("{}", added.id);
        }
        Commands::AddFile {
            path,
            name,
            tags,
            parent,
        } => {
            unlock(vault).await?;
            let added = vault
                .add_file_item(&name, &path, &tags, parent.as_deref())
                .await?;
            println!("{}", added.id);
        }
        Commands::Mkdir {
            name,
            parent,
            folder_type,
        } => {
            unlock(vault).await?;
            let folder = vault
                .add_folder(&name, parent.as_deref(), folder_type.as_deref())
                .await?;
            println!("{}", folder.id);
        }
        Commands::Update {
            id,
            name,
            comments,
            content,
            content_file,
            tags,
        } => {
            let content = match (content, content_file) {
                (Some(text), _) => Some(text.into_bytes()),
                (None, Some(path)) => Some(tokio::fs::read(&path).await?),
                (None, None) => None,
            };
            let update = ItemUpdate {
                name,
                comments: comments.map(|c| Some(c).filter(|c| !c.is_empty())),
                content,
                tags,
            };
            if update.is_empty() {
                return Err(LockboxError::InvalidInput("nothing to update".to_string()));
            }
            unlock(vault).await?;
            let updated = vault.update_item(&id, update).await?;
            status::print_items(std::slice::from_ref(&updated));
        }
        Commands::Mv { id, parent } => {
            unlock(vault).await?;
            vault.move_item(&id, parent.as_deref()).await?;
        }
        Commands::Rm { id } => {
            unlock(vault).await?;
            vault.delete_item(&id).await?;
        }
        Commands::Cat { id } => {
            unlock(vault).await?;
            let content = Zeroizing::new(vault.get_item_content(&id).await?);
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&content)?;
            stdout.flush()?;
        }
        Commands::Tags => {
            unlock(vault).await?;
            for tag in vault.get_all_tags().await? {
                println!("{tag}");
            }
        }
        Commands::RenameTag { old, new } => {
            unlock(vault).await?;
            vault.rename_tag(&old, &new).await?;
        }
        Commands::DeleteTag { name } => {
            unlock(vault).await?;
            vault.delete_tag(&name).await?;
        }
        Commands::ImportCsv { path, parent } => {
            let csv_text = tokio::fs::read_to_string(&path).await?;
            unlock(vault).await?;
            let report = vault.import_csv(&csv_text, parent.as_deref()).await?;
            status::print_import(&report);
        }
        Commands::Export { out, decrypted } => {
            let passphrase = lockbox_vault::read_passphrase()?;
            vault.unlock_vault(&passphrase).await?;
            if decrypted {
                let json = vault.export_decrypted_vault(&passphrase).await?;
                write_private(&out, json.as_bytes()).await?;
                eprintln!("Plaintext export written to {}. Delete it when done.", out.display());
            } else {
                let archive = vault.export_encrypted_vault().await?;
                write_private(&out, &archive).await?;
                eprintln!("Encrypted archive written to {}", out.display());
            }
        }
        Commands::Restore { archive } => {
            let bytes = tokio::fs::read(&archive).await?;
            let current = if vault.is_vault_initialized().await? {
                Some(lockbox_vault::read_passphrase()?)
            } else {
                None
            };
            vault.restore_encrypted_vault(&bytes, current.as_ref()).await?;
            eprintln!("Vault restored. Unlock it with the archive's passphrase.");
        }
        Commands::Rotate { preset } => {
            let current = lockbox_vault::read_passphrase()?;
            let new = lockbox_vault::read_new_passphrase()?;
            vault.update_master_key(&current, &new, preset).await?;
            eprintln!("Passphrase changed and every item re-encrypted.");
        }
        Commands::Lockout {
            enable,
            disable,
            max_attempts,
            minutes,
        } => {
            unlock(vault).await?;
            let current = vault.get_brute_force_config().await?;
            if !enable && !disable && max_attempts.is_none() && minutes.is_none() {
                status::print_lockout(&current);
                return Ok(());
            }
            let updated = BruteForceConfig {
                enabled: if enable || disable { enable } else { current.enabled },
                max_attempts: max_attempts.unwrap_or(current.max_attempts),
                lockout_duration_minutes: minutes.unwrap_or(current.lockout_duration_minutes),
            };
            vault.set_brute_force_config(updated).await?;
            status::print_lockout(&updated);
        }
        Commands::Destroy { yes } => {
            if !yes {
                return Err(LockboxError::InvalidInput(
                    "refusing to erase the vault without --yes".to_string(),
                ));
            }
            let passphrase = lockbox_vault::read_passphrase()?;
            vault.delete_vault(&passphrase).await?;
            eprintln!("Vault erased.");
        }
    }
    Ok(())
}

async fn unlock(vault: &Vault) -> Result<(), LockboxError> {
    let passphrase: SecretString = lockbox_vault::read_passphrase()?;
    vault.unlock_vault(&passphrase).await
}

fn read_stdin() -> Result<String, LockboxError> {
    let mut content = String::new();
    std::io::stdin().read_to_string(&mut content)?;
    Ok(content)
}

/// Write `bytes` to a new file readable only by the owner.
async fn write_private(path: &std::path::Path, bytes: &[u8]) -> Result<(), LockboxError> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    tokio::io::AsyncWriteExt::write_all(&mut file, bytes).await?;
    tokio::io::AsyncWriteExt::flush(&mut file).await?;
    Ok(())
}
