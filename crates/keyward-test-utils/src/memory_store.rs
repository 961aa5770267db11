// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory credential store for deterministic testing.
//!
//! `MemoryStore` implements `CredentialStore` over a `BTreeMap`, with hooks to
//! fail listing, fail `expire` for chosen ids, and delay listing so a scan
//! stays in flight under paused tokio time.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use keyward_core::sealed::NONCE_LEN;
use keyward_core::{
    CredentialId, CredentialRecord, CredentialStatus, CredentialStore, CredentialSummary,
    CredentialUpdate, Environment, KeyDerivationMode, KeywardError, RotationCandidate,
    RotationInterval, SealedCredential,
};

/// A credential store backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, CredentialRecord>>,
    failing_expire: Mutex<HashSet<String>>,
    list_delay: Mutex<Option<Duration>>,
    fail_listing: AtomicBool,
    expire_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = CredentialRecord>) -> Self {
        let store = Self::new();
        {
            let mut map = store.records();
            for record in records {
                map.insert(record.id.0.clone(), record);
            }
        }
        store
    }

    /// Make every `expire` call for `id` fail with a storage error.
    pub fn fail_expire_for(&self, id: &CredentialId) {
        lock(&self.failing_expire).insert(id.0.clone());
    }

    /// Make `list_by_status` fail.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long inside `list_by_status`.
    pub fn set_list_delay(&self, delay: Duration) {
        *lock(&self.list_delay) = Some(delay);
    }

    /// Number of `expire` calls received, successful or not.
    pub fn expire_calls(&self) -> usize {
        self.expire_calls.load(Ordering::SeqCst)
    }

    /// Number of `list_by_status` calls received.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Current status of a record, if present.
    pub fn status_of(&self, id: &CredentialId) -> Option<CredentialStatus> {
        self.records().get(id.as_str()).map(|r| r.status)
    }

    /// Overwrite a record's status, bypassing every lifecycle rule.
    pub fn force_status(&self, id: &CredentialId, status: CredentialStatus) {
        if let Some(record) = self.records().get_mut(id.as_str()) {
            record.status = status;
        }
    }

    /// Move a record's rotation clock `days` into the past.
    pub fn backdate(&self, id: &CredentialId, days: i64) {
        if let Some(record) = self.records().get_mut(id.as_str()) {
            record.last_rotated_at -= chrono::Duration::days(days);
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<String, CredentialRecord>> {
        lock(&self.records)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn injected(what: &str) -> KeywardError {
    KeywardError::storage(std::io::Error::other(format!("injected {what} failure")))
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert(&self, record: &CredentialRecord) -> Result<(), KeywardError> {
        let mut records = self.records();
        if records.contains_key(record.id.as_str()) {
            return Err(KeywardError::InvalidInput(format!(
                "duplicate credential id {}",
                record.id
            )));
        }
        records.insert(record.id.0.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &CredentialId) -> Result<Option<CredentialRecord>, KeywardError> {
        Ok(self.records().get(id.as_str()).cloned())
    }

    async fn list(&self, owner_id: Option<&str>) -> Result<Vec<CredentialSummary>, KeywardError> {
        let mut summaries: Vec<CredentialSummary> = self
            .records()
            .values()
            .filter(|r| owner_id.is_none_or(|owner| r.owner_id == owner))
            .map(CredentialSummary::from)
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn list_by_status(
        &self,
        status: CredentialStatus,
    ) -> Result<Vec<RotationCandidate>, KeywardError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.list_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(injected("listing"));
        }
        Ok(self
            .records()
            .values()
            .filter(|r| r.status == status)
            .map(RotationCandidate::from)
            .collect())
    }

    async fn replace_secret(
        &self,
        id: &CredentialId,
        sealed: &SealedCredential,
        rotated_at: Option<DateTime<Utc>>,
    ) -> Result<bool, KeywardError> {
        let mut records = self.records();
        let Some(record) = records.get_mut(id.as_str()) else {
            return Ok(false);
        };
        record.sealed = sealed.clone();
        if let Some(at) = rotated_at {
            record.last_rotated_at = at;
            if record.status == CredentialStatus::Expired {
                record.status = CredentialStatus::Active;
            }
        }
        Ok(true)
    }

    async fn update_metadata(
        &self,
        id: &CredentialId,
        update: &CredentialUpdate,
    ) -> Result<bool, KeywardError> {
        let mut records = self.records();
        let Some(record) = records.get_mut(id.as_str()) else {
            return Ok(false);
        };
        if let Some(name) = &update.name {
            record.name = name.clone();
        }
        if let Some(description) = &update.description {
            record.description = description.clone();
        }
        if let Some(environment) = update.environment {
            record.environment = environment;
        }
        if let Some(tags) = &update.tags {
            record.tags = tags.clone();
        }
        if let Some(interval) = update.rotation_interval {
            record.rotation_interval = interval;
        }
        Ok(true)
    }

    async fn record_use(&self, id: &CredentialId, at: DateTime<Utc>) -> Result<bool, KeywardError> {
        let mut records = self.records();
        let Some(record) = records.get_mut(id.as_str()) else {
            return Ok(false);
        };
        record.usage_count += 1;
        record.last_used_at = Some(at);
        Ok(true)
    }

    async fn set_status(
        &self,
        id: &CredentialId,
        status: CredentialStatus,
    ) -> Result<bool, KeywardError> {
        let mut records = self.records();
        match records.get_mut(id.as_str()) {
            Some(record) if record.status != CredentialStatus::Expired => {
                record.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire(
        &self,
        id: &CredentialId,
        observed_rotation: DateTime<Utc>,
    ) -> Result<bool, KeywardError> {
        self.expire_calls.fetch_add(1, Ordering::SeqCst);
        if lock(&self.failing_expire).contains(id.as_str()) {
            return Err(injected("expire"));
        }
        let mut records = self.records();
        match records.get_mut(id.as_str()) {
            Some(record)
                if record.status == CredentialStatus::Active
                    && record.last_rotated_at == observed_rotation =>
            {
                record.status = CredentialStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: &CredentialId) -> Result<bool, KeywardError> {
        Ok(self.records().remove(id.as_str()).is_some())
    }
}

/// Build a record with dummy sealed bytes. The sealed value is not
/// decryptable; use it only where nothing reveals the credential.
pub fn fixture_record(
    name: &str,
    interval_days: u16,
    last_rotated_at: DateTime<Utc>,
    status: CredentialStatus,
) -> CredentialRecord {
    CredentialRecord {
        id: CredentialId::from(name),
        owner_id: "owner-1".to_string(),
        name: name.to_string(),
        service: "openai".to_string(),
        description: None,
        environment: Environment::Development,
        tags: Vec::new(),
        sealed: SealedCredential {
            mode: KeyDerivationMode::ServiceSecret,
            nonce: [0u8; NONCE_LEN],
            ciphertext: vec![0u8; 32],
        },
        rotation_interval: RotationInterval::new(interval_days).unwrap_or_default(),
        status,
        created_at: last_rotated_at,
        last_rotated_at,
        last_used_at: None,
        usage_count: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expire_only_transitions_active_records() {
        let now = Utc::now();
        let store = MemoryStore::with_records([
            fixture_record("a", 30, now, CredentialStatus::Active),
            fixture_record("b", 30, now, CredentialStatus::Inactive),
        ]);

        assert!(store.expire(&"a".into(), now).await.unwrap());
        assert!(!store.expire(&"a".into(), now).await.unwrap());
        assert!(!store.expire(&"b".into(), now).await.unwrap());
        assert_eq!(store.expire_calls(), 3);
        assert_eq!(store.status_of(&"b".into()), Some(CredentialStatus::Inactive));
    }

    #[tokio::test]
    async fn expire_requires_the_observed_rotation_time() {
        let now = Utc::now();
        let store = MemoryStore::with_records([fixture_record(
            "a",
            30,
            now,
            CredentialStatus::Active,
        )]);
        let stale = now - chrono::Duration::days(40);

        assert!(!store.expire(&"a".into(), stale).await.unwrap());
        assert_eq!(store.status_of(&"a".into()), Some(CredentialStatus::Active));
        assert!(store.expire(&"a".into(), now).await.unwrap());
    }

    #[tokio::test]
    async fn replace_without_rotation_leaves_status() {
        let now = Utc::now();
        let store = MemoryStore::with_records([fixture_record(
            "a",
            30,
            now,
            CredentialStatus::Expired,
        )]);
        let sealed = store.get(&"a".into()).await.unwrap().unwrap().sealed;

        store.replace_secret(&"a".into(), &sealed, None).await.unwrap();
        assert_eq!(store.status_of(&"a".into()), Some(CredentialStatus::Expired));
        store
            .replace_secret(&"a".into(), &sealed, Some(Utc::now()))
            .await
            .unwrap();
        assert_eq!(store.status_of(&"a".into()), Some(CredentialStatus::Active));
    }

    #[tokio::test]
    async fn injected_failures_surface_as_storage_errors() {
        let store = MemoryStore::with_records([fixture_record(
            "a",
            30,
            Utc::now(),
            CredentialStatus::Active,
        )]);
        store.fail_expire_for(&"a".into());
        store.fail_listing(true);

        assert!(matches!(
            store.expire(&"a".into(), Utc::now()).await,
            Err(KeywardError::Storage { .. })
        ));
        assert!(store
            .list_by_status(CredentialStatus::Active)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn set_status_refuses_expired_records() {
        let store = MemoryStore::with_records([fixture_record(
            "a",
            30,
            Utc::now(),
            CredentialStatus::Expired,
        )]);
        assert!(!store
            .set_status(&"a".into(), CredentialStatus::Active)
            .await
            .unwrap());
    }
}
