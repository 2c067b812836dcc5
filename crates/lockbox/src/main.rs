// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lockbox - a local-first encrypted vault.
//!
//! Binary entry point. Every invocation opens the vault, unlocks it from
//! `LOCKBOX_PASSPHRASE` or a TTY prompt when the command needs it, runs one
//! command and exits.

mod commands;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lockbox_core::{ErrorResponse, KdfPreset, SortOrder};

/// Lockbox - a local-first encrypted vault.
#[derive(Parser, Debug)]
#[command(name = "lockbox", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print errors as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new vault protected by a passphrase.
    Init {
        /// Key derivation cost: fast, recommended or paranoid.
        #[arg(long)]
        preset: Option<KdfPreset>,
    },
    /// Show whether the vault exists and its lock state.
    Status {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// List items in a folder (root by default).
    Ls {
        /// Folder to list.
        #[arg(long)]
        parent: Option<String>,
        /// Kind name, mime prefix or folder type to keep.
        #[arg(long = "type")]
        type_filter: Option<String>,
        /// created_desc, created_asc, updated_desc, updated_asc, name_asc or name_desc.
        #[arg(long)]
        sort: Option<SortOrder>,
        /// List every item in the vault instead of one folder.
        #[arg(long, conflicts_with = "parent")]
        all: bool,
    },
    /// Add a text note or credential. Content is read from stdin unless given.
    AddText {
        name: String,
        #[arg(long)]
        content: Option<String>,
        /// Mime type; `key` stores a credential.
        #[arg(long, default_value = "text/plain")]
        mime: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Encrypt a file into the vault.
    AddFile {
        path: PathBuf,
        /// Item name; defaults to the file name.
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Create a folder.
    Mkdir {
        name: String,
        #[arg(long)]
        parent: Option<String>,
        /// UI category used by `ls --type`.
        #[arg(long)]
        folder_type: Option<String>,
    },
    /// Change an item's name, comments, content or tags.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// New comments; an empty string clears them.
        #[arg(long)]
        comments: Option<String>,
        #[arg(long, conflicts_with = "content_file")]
        content: Option<String>,
        #[arg(long)]
        content_file: Option<PathBuf>,
        /// Replaces the whole tag set.
        #[arg(long = "tag")]
        tags: Option<Vec<String>>,
    },
    /// Move an item into another folder (root when no parent is given).
    Mv {
        id: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Delete an item; folders are deleted with everything inside.
    Rm { id: String },
    /// Write an item's decrypted content to stdout.
    Cat { id: String },
    /// List every tag in use.
    Tags,
    /// Rename a tag on every item.
    RenameTag { old: String, new: String },
    /// Remove a tag from every item.
    DeleteTag { name: String },
    /// Import credentials from a password-manager CSV export.
    ImportCsv {
        path: PathBuf,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Export the vault as an encrypted archive, or as plaintext JSON.
    Export {
        /// Output file.
        #[arg(long)]
        out: PathBuf,
        /// Write every secret in plaintext JSON. Asks for the passphrase again.
        #[arg(long)]
        decrypted: bool,
    },
    /// Replace the vault with the contents of an encrypted archive.
    Restore { archive: PathBuf },
    /// Change the master passphrase and re-encrypt every item.
    Rotate {
        #[arg(long)]
        preset: Option<KdfPreset>,
    },
    /// Show or change the brute-force lockout policy.
    Lockout {
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
        #[arg(long)]
        max_attempts: Option<u32>,
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Permanently erase the vault.
    Destroy {
        /// Confirm the erase.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => lockbox_config::load_and_validate_path(path),
        None => lockbox_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            lockbox_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log.level);

    if let Err(e) = commands::run(cli.command, &config).await {
        if cli.json {
            let response = ErrorResponse::from(&e);
            eprintln!(
                "{}",
                serde_json::to_string(&response).unwrap_or_else(|_| e.to_string())
            );
        } else {
            eprintln!("error: {e}");
        }
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber with an EnvFilter.
///
/// `RUST_LOG` wins; otherwise the `lockbox*` targets log at `log_level` and
/// everything else at warn. Output goes to stderr so stdout stays clean
/// for `cat` and listings.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lockbox={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
