// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the CredentialStore trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use keyward_config::model::StorageConfig;
use keyward_core::{
    CredentialId, CredentialRecord, CredentialStatus, CredentialStore, CredentialSummary,
    CredentialUpdate, KeywardError, RotationCandidate, SealedCredential,
};

use crate::database::Database;
use crate::queries::credentials;

/// SQLite-backed credential store.
///
/// Wraps a [`Database`] handle and delegates to the typed query module.
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Open the database named by `config`, running migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, KeywardError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite credential store initialized");
        Ok(Self { db })
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    /// Checkpoint the WAL before shutdown.
    pub async fn close(&self) -> Result<(), KeywardError> {
        self.db.checkpoint().await
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn insert(&self, record: &CredentialRecord) -> Result<(), KeywardError> {
        credentials::insert_credential(&self.db, record).await
    }

    async fn get(&self, id: &CredentialId) -> Result<Option<CredentialRecord>, KeywardError> {
        credentials::get_credential(&self.db, id).await
    }

    async fn list(&self, owner_id: Option<&str>) -> Result<Vec<CredentialSummary>, KeywardError> {
        credentials::list_credentials(&self.db, owner_id).await
    }

    async fn list_by_status(
        &self,
        status: CredentialStatus,
    ) -> Result<Vec<RotationCandidate>, KeywardError> {
        credentials::list_candidates(&self.db, status).await
    }

    async fn replace_secret(
        &self,
        id: &CredentialId,
        sealed: &SealedCredential,
        rotated_at: Option<DateTime<Utc>>,
    ) -> Result<bool, KeywardError> {
        credentials::replace_secret(&self.db, id, sealed, rotated_at).await
    }

    async fn update_metadata(
        &self,
        id: &CredentialId,
        update: &CredentialUpdate,
    ) -> Result<bool, KeywardError> {
        credentials::update_metadata(&self.db, id, update).await
    }

    async fn record_use(&self, id: &CredentialId, at: DateTime<Utc>) -> Result<bool, KeywardError> {
        credentials::record_use(&self.db, id, at).await
    }

    async fn set_status(
        &self,
        id: &CredentialId,
        status: CredentialStatus,
    ) -> Result<bool, KeywardError> {
        credentials::set_status(&self.db, id, status).await
    }

    async fn expire(
        &self,
        id: &CredentialId,
        observed_rotation: DateTime<Utc>,
    ) -> Result<bool, KeywardError> {
        credentials::expire(&self.db, id, observed_rotation).await
    }

    async fn delete(&self, id: &CredentialId) -> Result<bool, KeywardError> {
        credentials::delete_credential(&self.db, id).await
    }
}
