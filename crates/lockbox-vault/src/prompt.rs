// SPDX-FileCopyrightText: 2026 Lockbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Passphrase input from the environment or an interactive TTY.

use std::io::IsTerminal;

use lockbox_core::LockboxError;
use secrecy::SecretString;
use zeroize::Zeroizing;

/// Passphrase for unlocking and confirming.
pub const PASSPHRASE_ENV_VAR: &str = "LOCKBOX_PASSPHRASE";

/// Passphrase for `init` and the target of `rotate`.
pub const NEW_PASSPHRASE_ENV_VAR: &str = "LOCKBOX_NEW_PASSPHRASE";

fn from_env(var: &str) -> Option<SecretString> {
    std::env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
}

fn read_tty(label: &str) -> Result<Zeroizing<String>, LockboxError> {
    eprint!("{label}: ");
    rpassword::read_password()
        .map(Zeroizing::new)
        .map_err(|e| LockboxError::InvalidInput(format!("failed to read passphrase: {e}")))
}

fn no_source(var: &str) -> LockboxError {
    LockboxError::InvalidInput(format!(
        "no passphrase provided; set {var} or run interactively"
    ))
}

/// Current vault passphrase: `LOCKBOX_PASSPHRASE`, else a TTY prompt.
pub fn read_passphrase() -> Result<SecretString, LockboxError> {
    if let Some(passphrase) = from_env(PASSPHRASE_ENV_VAR) {
        return Ok(passphrase);
    }
    if std::io::stdin().is_terminal() {
        let passphrase = read_tty("Vault passphrase")?;
        if passphrase.is_empty() {
            return Err(LockboxError::InvalidInput("passphrase must not be empty".to_string()));
        }
        return Ok(SecretString::from(passphrase.as_str()));
    }
    Err(no_source(PASSPHRASE_ENV_VAR))
}

/// New passphrase: `LOCKBOX_NEW_PASSPHRASE`, else prompted twice on a TTY.
pub fn read_new_passphrase() -> Result<SecretString, LockboxError> {
    if let Some(passphrase) = from_env(NEW_PASSPHRASE_ENV_VAR) {
        return Ok(passphrase);
    }
    if std::io::stdin().is_terminal() {
        let first = read_tty("New vault passphrase")?;
        let second = read_tty("Confirm new passphrase")?;
        return confirm_new(&first, &second);
    }
    Err(no_source(NEW_PASSPHRASE_ENV_VAR))
}

/// Both entries must match and be non-empty. The caller's buffers are
/// wiped on drop whatever the outcome.
fn confirm_new(first: &Zeroizing<String>, second: &Zeroizing<String>) -> Result<SecretString, LockboxError> {
    if first.as_str() != second.as_str() {
        return Err(LockboxError::InvalidInput("passphrases do not match".to_string()));
    }
    if first.is_empty() {
        return Err(LockboxError::InvalidInput("passphrase must not be empty".to_string()));
    }
    Ok(SecretString::from(first.as_str()))
}
