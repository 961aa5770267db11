// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Passphrase and credential-value acquisition via TTY prompt or the
//! KEYWARD_PASSPHRASE environment variable.

use keyward_core::KeywardError;
use secrecy::SecretString;

/// The environment variable name for providing a credential passphrase.
pub const PASSPHRASE_ENV_VAR: &str = "KEYWARD_PASSPHRASE";

const NO_TTY_MESSAGE: &str =
    "No passphrase provided. Set KEYWARD_PASSPHRASE environment variable or run interactively.";

/// Get a credential passphrase from environment variable or interactive TTY prompt.
///
/// Priority:
/// 1. `KEYWARD_PASSPHRASE` environment variable (for scripts and CI)
/// 2. Interactive TTY prompt via `rpassword`
pub fn get_passphrase() -> Result<SecretString, KeywardError> {
    if let Some(passphrase) = passphrase_from_env() {
        return Ok(passphrase);
    }

    if is_interactive() {
        let passphrase = read_hidden("Passphrase: ")?;
        return non_empty(passphrase, "passphrase");
    }

    Err(KeywardError::InvalidInput(NO_TTY_MESSAGE.to_string()))
}

/// Get a new passphrase with confirmation prompt.
///
/// Prompts twice and verifies the passphrases match. The env var needs no
/// confirmation.
pub fn get_passphrase_with_confirm() -> Result<SecretString, KeywardError> {
    if let Some(passphrase) = passphrase_from_env() {
        return Ok(passphrase);
    }

    if is_interactive() {
        let pass1 = read_hidden("New passphrase: ")?;
        let pass2 = read_hidden("Confirm passphrase: ")?;

        if pass1 != pass2 {
            return Err(KeywardError::InvalidInput(
                "passphrases do not match".to_string(),
            ));
        }
        return non_empty(pass1, "passphrase");
    }

    Err(KeywardError::InvalidInput(NO_TTY_MESSAGE.to_string()))
}

/// Read a credential value from a hidden TTY prompt.
///
/// Values are never accepted from the environment or the command line.
pub fn read_credential_value(prompt: &str) -> Result<SecretString, KeywardError> {
    if !is_interactive() {
        return Err(KeywardError::InvalidInput(
            "credential values can only be entered interactively".to_string(),
        ));
    }
    let value = read_hidden(prompt)?;
    non_empty(value, "credential value")
}

fn passphrase_from_env() -> Option<SecretString> {
    std::env::var(PASSPHRASE_ENV_VAR)
        .ok()
        .filter(|key| !key.is_empty())
        .map(SecretString::from)
}

fn is_interactive() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stdin())
}

fn read_hidden(prompt: &str) -> Result<String, KeywardError> {
    rpassword::prompt_password(prompt)
        .map_err(|e| KeywardError::InvalidInput(format!("failed to read from terminal: {e}")))
}

fn non_empty(value: String, what: &str) -> Result<SecretString, KeywardError> {
    if value.is_empty() {
        return Err(KeywardError::InvalidInput(format!("empty {what} not allowed")));
    }
    Ok(SecretString::from(value))
}
