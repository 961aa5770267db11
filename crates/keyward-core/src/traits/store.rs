// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence interface for credential records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::KeywardError;
use crate::sealed::SealedCredential;
use crate::types::{
    CredentialId, CredentialRecord, CredentialStatus, CredentialSummary, CredentialUpdate,
    RotationCandidate,
};

/// Backing store for credential records.
///
/// Every mutating call is a single atomic update of one record. Methods that
/// target a record by id return `Ok(false)` when no row was changed.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a freshly created record.
    async fn insert(&self, record: &CredentialRecord) -> Result<(), KeywardError>;

    /// Fetch a full record, including its sealed value.
    async fn get(&self, id: &CredentialId) -> Result<Option<CredentialRecord>, KeywardError>;

    /// List metadata for all records, optionally restricted to one owner.
    ///
    /// Implementations must not read sealed values on this path.
    async fn list(&self, owner_id: Option<&str>) -> Result<Vec<CredentialSummary>, KeywardError>;

    /// Enumerate the non-secret rotation view of every record in `status`.
    async fn list_by_status(
        &self,
        status: CredentialStatus,
    ) -> Result<Vec<RotationCandidate>, KeywardError>;

    /// Replace the sealed value.
    ///
    /// With `rotated_at`, this is an owner rotation: the timestamp is stamped
    /// and an `Expired` record becomes `Active` in the same update. Without
    /// it the status column is left exactly as the store currently has it.
    async fn replace_secret(
        &self,
        id: &CredentialId,
        sealed: &SealedCredential,
        rotated_at: Option<DateTime<Utc>>,
    ) -> Result<bool, KeywardError>;

    /// Apply the fields set in `update`, leaving the others untouched.
    async fn update_metadata(
        &self,
        id: &CredentialId,
        update: &CredentialUpdate,
    ) -> Result<bool, KeywardError>;

    /// Count one use of the credential and stamp `last_used_at`.
    async fn record_use(&self, id: &CredentialId, at: DateTime<Utc>) -> Result<bool, KeywardError>;

    /// Owner-driven status change. Never applies to an `Expired` record;
    /// returns `false` if the record is gone or expired.
    async fn set_status(
        &self,
        id: &CredentialId,
        status: CredentialStatus,
    ) -> Result<bool, KeywardError>;

    /// Transition `Active -> Expired`, but only while `last_rotated_at` still
    /// equals `observed_rotation`. Returns `false` if the record is gone, no
    /// longer active, or was rotated after it was observed.
    async fn expire(
        &self,
        id: &CredentialId,
        observed_rotation: DateTime<Utc>,
    ) -> Result<bool, KeywardError>;

    /// Delete a record.
    async fn delete(&self, id: &CredentialId) -> Result<bool, KeywardError>;
}
