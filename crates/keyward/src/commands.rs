// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential subcommands: thin wrappers over [`CredentialVault`].
//!
//! Values and passphrases come from hidden prompts (passphrases may also
//! come from `KEYWARD_PASSPHRASE`). Only `reveal` and `regenerate` print a
//! credential value.

use std::sync::Arc;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};

use keyward_config::model::KeywardConfig;
use keyward_core::{
    CredentialId, CredentialStatus, CredentialStore, CredentialSummary, CredentialUpdate, KeyMode,
    KeywardError, RotationInterval,
};
use keyward_storage::SqliteStore;
use keyward_vault::{
    CredentialCipher, CredentialVault, NewCredential, Protection, get_passphrase,
    get_passphrase_with_confirm, read_credential_value,
};

use crate::output;

/// Output mode shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct Format {
    pub json: bool,
}

/// Everything a credential command needs.
pub struct Context {
    vault: CredentialVault,
    store: Arc<SqliteStore>,
    format: Format,
}

impl Context {
    pub async fn open(config: &KeywardConfig, format: Format) -> Result<Self, KeywardError> {
        let cipher = Arc::new(CredentialCipher::new(&config.cipher)?);
        let store = Arc::new(SqliteStore::open(&config.storage).await?);
        let default_interval = RotationInterval::new(config.rotation.default_interval_days)?;
        let vault = CredentialVault::new(cipher, store.clone() as Arc<dyn CredentialStore>)
            .with_default_interval(default_interval);
        Ok(Self {
            vault,
            store,
            format,
        })
    }

    /// Checkpoint the database before the process exits.
    pub async fn close(self) -> Result<(), KeywardError> {
        self.store.close().await
    }

    pub async fn add(
        &self,
        new: NewCredential,
        use_passphrase: bool,
    ) -> Result<(), KeywardError> {
        let value = read_credential_value("Credential value: ")?;
        let summary = if use_passphrase {
            let passphrase = get_passphrase_with_confirm()?;
            self.vault
                .store(new, &value, Protection::Passphrase(&passphrase))
                .await?
        } else {
            self.vault.store(new, &value, Protection::ServiceSecret).await?
        };
        self.print_summary(&summary)
    }

    pub async fn list(&self, owner: Option<&str>) -> Result<(), KeywardError> {
        let summaries = self.vault.list(owner).await?;
        if self.format.json {
            println!("{}", output::to_json(&summaries)?);
        } else {
            println!("{}", output::format_table(&summaries, Utc::now()));
        }
        Ok(())
    }

    pub async fn show(&self, id: &CredentialId) -> Result<(), KeywardError> {
        let summary = self.vault.get(id).await?;
        self.print_summary(&summary)
    }

    pub async fn update(
        &self,
        id: &CredentialId,
        changes: CredentialUpdate,
    ) -> Result<(), KeywardError> {
        let summary = self.vault.update(id, changes).await?;
        self.print_summary(&summary)
    }

    pub async fn reveal(&self, id: &CredentialId) -> Result<(), KeywardError> {
        let summary = self.vault.get(id).await?;
        let value = match summary.key_mode {
            KeyMode::ServiceSecret => self.vault.reveal(id, None).await?,
            KeyMode::UserPassphrase => {
                let passphrase = get_passphrase()?;
                self.vault.reveal(id, Some(&passphrase)).await?
            }
        };
        self.print_value(&value)
    }

    /// Replace the value, keeping the credential's current protection mode.
    pub async fn rotate(&self, id: &CredentialId) -> Result<(), KeywardError> {
        let summary = self.vault.get(id).await?;
        let value = read_credential_value("New credential value: ")?;
        let summary = match summary.key_mode {
            KeyMode::ServiceSecret => {
                self.vault
                    .rotate(id, &value, Protection::ServiceSecret)
                    .await?
            }
            KeyMode::UserPassphrase => {
                let passphrase = get_passphrase_with_confirm()?;
                self.vault
                    .rotate(id, &value, Protection::Passphrase(&passphrase))
                    .await?
            }
        };
        self.print_summary(&summary)
    }

    pub async fn regenerate(&self, id: &CredentialId, byte_len: usize) -> Result<(), KeywardError> {
        let summary = self.vault.get(id).await?;
        let (_, value) = match summary.key_mode {
            KeyMode::ServiceSecret => {
                self.vault
                    .regenerate(id, byte_len, Protection::ServiceSecret)
                    .await?
            }
            KeyMode::UserPassphrase => {
                let passphrase = get_passphrase_with_confirm()?;
                self.vault
                    .regenerate(id, byte_len, Protection::Passphrase(&passphrase))
                    .await?
            }
        };
        self.print_value(&value)
    }

    pub async fn rewrap(&self, id: &CredentialId) -> Result<(), KeywardError> {
        let passphrase = get_passphrase_with_confirm()?;
        let summary = self.vault.rewrap_with_passphrase(id, &passphrase).await?;
        if !self.format.json {
            eprintln!(
                "credential {id} is now passphrase-protected; \
                 a lost passphrase cannot be recovered"
            );
        }
        self.print_summary(&summary)
    }

    pub async fn set_status(
        &self,
        id: &CredentialId,
        status: CredentialStatus,
    ) -> Result<(), KeywardError> {
        let summary = self.vault.set_status(id, status).await?;
        self.print_summary(&summary)
    }

    pub async fn delete(&self, id: &CredentialId, confirmed: bool) -> Result<(), KeywardError> {
        if !confirmed {
            return Err(KeywardError::InvalidInput(format!(
                "refusing to delete {id} without --yes"
            )));
        }
        self.vault.delete(id).await?;
        if self.format.json {
            println!("{}", output::to_json(&serde_json::json!({ "deleted": id.as_str() }))?);
        } else {
            println!("deleted {id}");
        }
        Ok(())
    }

    fn print_summary(&self, summary: &CredentialSummary) -> Result<(), KeywardError> {
        if self.format.json {
            println!("{}", output::to_json(summary)?);
        } else {
            println!("{}", output::format_detail(summary, Utc::now()));
        }
        Ok(())
    }

    fn print_value(&self, value: &SecretString) -> Result<(), KeywardError> {
        if self.format.json {
            let body = serde_json::json!({ "value": value.expose_secret() });
            println!("{}", output::to_json(&body)?);
        } else {
            println!("{}", value.expose_secret());
        }
        Ok(())
    }
}
