// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential vault service: owner-facing lifecycle operations over a
//! [`CredentialStore`], with every value sealed by the [`CredentialCipher`].
//!
//! Plaintext only exists inside [`SecretString`]s handed in by the caller or
//! returned from [`CredentialVault::reveal`] and [`CredentialVault::regenerate`].

use std::sync::Arc;

use chrono::Utc;
use keyward_core::{
    CredentialId, CredentialRecord, CredentialStatus, CredentialStore, CredentialSummary,
    CredentialUpdate, Environment, KeyMode, KeywardError, RotationInterval, SealedCredential,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::cipher::CredentialCipher;

/// Maximum credential name length, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Maximum service name length, in characters.
pub const MAX_SERVICE_LEN: usize = 50;

/// Maximum description length, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Maximum length of one tag, in characters.
pub const MAX_TAG_LEN: usize = 30;

/// Maximum number of tags on one credential.
pub const MAX_TAGS: usize = 20;

/// Metadata for a credential about to be stored.
#[derive(Debug, Clone, Default)]
pub struct NewCredential {
    pub owner_id: String,
    pub name: String,
    pub service: String,
    pub description: Option<String>,
    pub environment: Environment,
    pub tags: Vec<String>,
    /// `None` uses the vault's default interval.
    pub rotation_interval: Option<RotationInterval>,
}

/// Which key protects a value being written.
#[derive(Clone, Copy)]
pub enum Protection<'a> {
    ServiceSecret,
    Passphrase(&'a SecretString),
}

impl std::fmt::Debug for Protection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServiceSecret => f.write_str("ServiceSecret"),
            Self::Passphrase(_) => f.write_str("Passphrase([REDACTED])"),
        }
    }
}

/// Owner-facing credential operations.
pub struct CredentialVault {
    cipher: Arc<CredentialCipher>,
    store: Arc<dyn CredentialStore>,
    default_interval: RotationInterval,
}

impl CredentialVault {
    pub fn new(cipher: Arc<CredentialCipher>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            cipher,
            store,
            default_interval: RotationInterval::default(),
        }
    }

    /// Override the interval applied when a new credential does not pick one.
    pub fn with_default_interval(mut self, interval: RotationInterval) -> Self {
        self.default_interval = interval;
        self
    }

    /// Encrypt and persist a new credential.
    pub async fn store(
        &self,
        new: NewCredential,
        value: &SecretString,
        protection: Protection<'_>,
    ) -> Result<CredentialSummary, KeywardError> {
        let owner_id = new.owner_id.trim();
        if owner_id.is_empty() {
            return Err(KeywardError::InvalidInput(
                "owner id must not be empty".to_string(),
            ));
        }
        let name = validate_name(&new.name)?;
        let service = validate_service(&new.service)?;
        let description = match new.description.as_deref() {
            Some(text) => validate_description(text)?,
            None => None,
        };
        let tags = validate_tags(&new.tags)?;
        require_value(value)?;

        let sealed = self.seal(value, protection).await?;
        let now = Utc::now();
        let record = CredentialRecord {
            id: CredentialId::generate(),
            owner_id: owner_id.to_string(),
            name,
            service,
            description,
            environment: new.environment,
            tags,
            sealed,
            rotation_interval: new.rotation_interval.unwrap_or(self.default_interval),
            status: CredentialStatus::Active,
            created_at: now,
            last_rotated_at: now,
            last_used_at: None,
            usage_count: 0,
        };
        self.store.insert(&record).await?;

        info!(
            id = %record.id,
            owner_id = %record.owner_id,
            service = %record.service,
            key_mode = %record.sealed.key_mode(),
            "credential stored"
        );
        Ok(record.summary())
    }

    /// Decrypt and return a credential value. Callers must only invoke this
    /// on an explicit owner request.
    pub async fn reveal(
        &self,
        id: &CredentialId,
        passphrase: Option<&SecretString>,
    ) -> Result<SecretString, KeywardError> {
        let record = self.fetch(id).await?;
        let value = self.open(&record.sealed, passphrase).await?;
        info!(id = %id, key_mode = %record.sealed.key_mode(), "credential revealed");
        // Usage tracking never blocks a successful reveal.
        if let Err(e) = self.store.record_use(id, Utc::now()).await {
            warn!(id = %id, error = %e, "failed to record credential use");
        }
        Ok(value)
    }

    /// Change owner-editable metadata.
    ///
    /// Only the fields set in `changes` are written. A new rotation interval
    /// applies from the current `last_rotated_at`; it does not revive an
    /// `Expired` credential.
    pub async fn update(
        &self,
        id: &CredentialId,
        changes: CredentialUpdate,
    ) -> Result<CredentialSummary, KeywardError> {
        if changes.is_empty() {
            return Err(KeywardError::InvalidInput(
                "no metadata changes were given".to_string(),
            ));
        }
        let update = CredentialUpdate {
            name: changes.name.as_deref().map(validate_name).transpose()?,
            description: match changes.description {
                Some(Some(text)) => Some(validate_description(&text)?),
                Some(None) => Some(None),
                None => None,
            },
            environment: changes.environment,
            tags: changes.tags.as_deref().map(validate_tags).transpose()?,
            rotation_interval: changes.rotation_interval,
        };
        if !self.store.update_metadata(id, &update).await? {
            return Err(not_found(id));
        }
        let summary = self.get(id).await?;
        info!(
            id = %id,
            environment = %summary.environment,
            interval_days = summary.rotation_interval_days,
            "credential metadata updated"
        );
        Ok(summary)
    }

    /// Replace a credential's value with a new owner-supplied one.
    ///
    /// Bumps `last_rotated_at` and revives an `Expired` credential.
    pub async fn rotate(
        &self,
        id: &CredentialId,
        new_value: &SecretString,
        protection: Protection<'_>,
    ) -> Result<CredentialSummary, KeywardError> {
        require_value(new_value)?;
        let record = self.fetch(id).await?;
        let sealed = self.seal(new_value, protection).await?;
        let summary = self.replace(&record, sealed, true).await?;
        info!(id = %id, key_mode = %summary.key_mode, "credential rotated");
        Ok(summary)
    }

    /// Rotate to a freshly generated random value of `byte_len` bytes.
    ///
    /// The new value is returned exactly once and never stored in plaintext.
    pub async fn regenerate(
        &self,
        id: &CredentialId,
        byte_len: usize,
        protection: Protection<'_>,
    ) -> Result<(CredentialSummary, SecretString), KeywardError> {
        let value = CredentialCipher::generate_random_secret(byte_len)?;
        let record = self.fetch(id).await?;
        let sealed = self.seal(&value, protection).await?;
        let summary = self.replace(&record, sealed, true).await?;
        info!(id = %id, byte_len, "credential regenerated");
        Ok((summary, value))
    }

    /// Migrate a service-secret credential to passphrase protection.
    ///
    /// The value is unchanged, so neither `last_rotated_at` nor the status moves.
    pub async fn rewrap_with_passphrase(
        &self,
        id: &CredentialId,
        passphrase: &SecretString,
    ) -> Result<CredentialSummary, KeywardError> {
        let record = self.fetch(id).await?;
        if record.sealed.key_mode() != KeyMode::ServiceSecret {
            return Err(KeywardError::InvalidInput(format!(
                "credential {id} is already passphrase-protected"
            )));
        }
        let value = self.cipher.decrypt_with_service_secret(&record.sealed)?;
        let sealed = self.seal(&value, Protection::Passphrase(passphrase)).await?;
        let summary = self.replace(&record, sealed, false).await?;
        warn!(
            id = %id,
            from = %KeyMode::ServiceSecret,
            to = %KeyMode::UserPassphrase,
            "credential re-wrapped; the service secret can no longer decrypt it"
        );
        Ok(summary)
    }

    /// Owner toggle between `Active` and `Inactive`.
    ///
    /// `Expired` can neither be requested nor left this way; rotate instead.
    pub async fn set_status(
        &self,
        id: &CredentialId,
        status: CredentialStatus,
    ) -> Result<CredentialSummary, KeywardError> {
        let mut record = self.fetch(id).await?;
        if status == CredentialStatus::Expired || record.status == CredentialStatus::Expired {
            return Err(KeywardError::InvalidTransition {
                from: record.status,
                to: status,
            });
        }
        if record.status != status {
            // The store refuses to overwrite `Expired`; the engine may have
            // expired the record since it was fetched.
            if !self.store.set_status(id, status).await? {
                let current = self.fetch(id).await?;
                return Err(KeywardError::InvalidTransition {
                    from: current.status,
                    to: status,
                });
            }
            info!(id = %id, from = %record.status, to = %status, "credential status changed");
            record.status = status;
        }
        Ok(record.summary())
    }

    /// Remove a credential permanently.
    pub async fn delete(&self, id: &CredentialId) -> Result<(), KeywardError> {
        if !self.store.delete(id).await? {
            return Err(not_found(id));
        }
        info!(id = %id, "credential deleted");
        Ok(())
    }

    /// Metadata for one credential. Never decrypts.
    pub async fn get(&self, id: &CredentialId) -> Result<CredentialSummary, KeywardError> {
        Ok(self.fetch(id).await?.summary())
    }

    /// Metadata for all credentials, optionally for one owner. Never decrypts.
    pub async fn list(&self, owner_id: Option<&str>) -> Result<Vec<CredentialSummary>, KeywardError> {
        self.store.list(owner_id).await
    }

    async fn fetch(&self, id: &CredentialId) -> Result<CredentialRecord, KeywardError> {
        self.store.get(id).await?.ok_or_else(|| not_found(id))
    }

    /// Write a new sealed value. The store decides the resulting status, so
    /// a concurrent expiry or owner toggle is never overwritten with what
    /// `previous` held.
    async fn replace(
        &self,
        previous: &CredentialRecord,
        sealed: SealedCredential,
        rotated: bool,
    ) -> Result<CredentialSummary, KeywardError> {
        let rotated_at = rotated.then(Utc::now);
        if !self
            .store
            .replace_secret(&previous.id, &sealed, rotated_at)
            .await?
        {
            return Err(not_found(&previous.id));
        }
        let current = self.fetch(&previous.id).await?;
        if current.status != previous.status {
            debug!(
                id = %current.id,
                from = %previous.status,
                to = %current.status,
                "status changed while the value was replaced"
            );
        }
        Ok(current.summary())
    }

    async fn seal(
        &self,
        value: &SecretString,
        protection: Protection<'_>,
    ) -> Result<SealedCredential, KeywardError> {
        match protection {
            Protection::ServiceSecret => {
                self.cipher.encrypt_with_service_secret(value.expose_secret())
            }
            Protection::Passphrase(passphrase) => {
                let cipher = Arc::clone(&self.cipher);
                let value = duplicate(value);
                let passphrase = duplicate(passphrase);
                run_blocking(move || {
                    cipher.encrypt_with_passphrase(value.expose_secret(), &passphrase)
                })
                .await
            }
        }
    }

    async fn open(
        &self,
        sealed: &SealedCredential,
        passphrase: Option<&SecretString>,
    ) -> Result<SecretString, KeywardError> {
        if !sealed.requires_passphrase() {
            return self.cipher.decrypt_with_service_secret(sealed);
        }
        let Some(passphrase) = passphrase else {
            return self.cipher.decrypt(sealed, None);
        };
        let cipher = Arc::clone(&self.cipher);
        let sealed = sealed.clone();
        let passphrase = duplicate(passphrase);
        run_blocking(move || cipher.decrypt_with_passphrase(&sealed, &passphrase)).await
    }
}

/// Run a CPU-bound KDF call off the async worker threads.
async fn run_blocking<T, F>(f: F) -> Result<T, KeywardError>
where
    F: FnOnce() -> Result<T, KeywardError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| KeywardError::Internal(format!("key derivation task failed: {e}")))?
}

fn duplicate(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

fn not_found(id: &CredentialId) -> KeywardError {
    KeywardError::NotFound { id: id.to_string() }
}

fn require_value(value: &SecretString) -> Result<(), KeywardError> {
    if value.expose_secret().is_empty() {
        return Err(KeywardError::InvalidInput(
            "credential value must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<String, KeywardError> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(KeywardError::InvalidInput(format!(
            "name must be between 1 and {MAX_NAME_LEN} characters, got {len}"
        )));
    }
    Ok(name.to_string())
}

/// Trimmed description; blank text means no description.
fn validate_description(text: &str) -> Result<Option<String>, KeywardError> {
    let text = text.trim();
    let len = text.chars().count();
    if len > MAX_DESCRIPTION_LEN {
        return Err(KeywardError::InvalidInput(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters, got {len}"
        )));
    }
    Ok((!text.is_empty()).then(|| text.to_string()))
}

fn validate_tags(tags: &[String]) -> Result<Vec<String>, KeywardError> {
    let mut clean: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        let len = tag.chars().count();
        if len > MAX_TAG_LEN {
            return Err(KeywardError::InvalidInput(format!(
                "tag `{tag}` must be at most {MAX_TAG_LEN} characters, got {len}"
            )));
        }
        if !clean.iter().any(|seen| seen == tag) {
            clean.push(tag.to_string());
        }
    }
    if clean.len() > MAX_TAGS {
        return Err(KeywardError::InvalidInput(format!(
            "at most {MAX_TAGS} tags are allowed, got {}",
            clean.len()
        )));
    }
    Ok(clean)
}

fn validate_service(service: &str) -> Result<String, KeywardError> {
    let service = service.trim().to_lowercase();
    let len = service.chars().count();
    if len == 0 || len > MAX_SERVICE_LEN {
        return Err(KeywardError::InvalidInput(format!(
            "service must be between 1 and {MAX_SERVICE_LEN} characters, got {len}"
        )));
    }
    Ok(service)
}
