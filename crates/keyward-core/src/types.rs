// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential records and their metadata-only projections.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::KeywardError;
use crate::sealed::{KeyMode, SealedCredential};

/// Unique identifier for a stored credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(pub String);

impl CredentialId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CredentialId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle status of a credential.
///
/// `Active` and `Inactive` are owner-toggled. `Expired` is only ever set by
/// the rotation policy engine and only cleared by an owner rotation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Active,
    Inactive,
    Expired,
}

/// Deployment environment a credential belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

/// Days between required rotations, bounded to `[1, 365]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct RotationInterval(u16);

impl RotationInterval {
    pub const MIN_DAYS: u16 = 1;
    pub const MAX_DAYS: u16 = 365;
    pub const DEFAULT_DAYS: u16 = 90;

    pub fn new(days: u16) -> Result<Self, KeywardError> {
        if !(Self::MIN_DAYS..=Self::MAX_DAYS).contains(&days) {
            return Err(KeywardError::InvalidInput(format!(
                "rotation interval must be between {} and {} days, got {days}",
                Self::MIN_DAYS,
                Self::MAX_DAYS
            )));
        }
        Ok(Self(days))
    }

    pub fn days(self) -> u16 {
        self.0
    }
}

impl Default for RotationInterval {
    fn default() -> Self {
        Self(Self::DEFAULT_DAYS)
    }
}

impl TryFrom<u16> for RotationInterval {
    type Error = KeywardError;

    fn try_from(days: u16) -> Result<Self, Self::Error> {
        Self::new(days)
    }
}

impl From<RotationInterval> for u16 {
    fn from(interval: RotationInterval) -> Self {
        interval.0
    }
}

/// One third-party API key at rest.
///
/// Intentionally not `Serialize`: the only serializable view of a credential
/// is [`CredentialSummary`], which carries no ciphertext.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub id: CredentialId,
    pub owner_id: String,
    pub name: String,
    pub service: String,
    pub description: Option<String>,
    pub environment: Environment,
    pub tags: Vec<String>,
    pub sealed: SealedCredential,
    pub rotation_interval: RotationInterval,
    pub status: CredentialStatus,
    pub created_at: DateTime<Utc>,
    pub last_rotated_at: DateTime<Utc>,
    /// Last successful reveal.
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: u64,
}

impl CredentialRecord {
    /// The instant at which the policy engine will consider this credential stale.
    pub fn rotation_due_at(&self) -> DateTime<Utc> {
        self.last_rotated_at + Duration::days(i64::from(self.rotation_interval.days()))
    }

    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary::from(self)
    }
}

/// Metadata-only projection returned by list/read paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub id: CredentialId,
    pub owner_id: String,
    pub name: String,
    pub service: String,
    pub description: Option<String>,
    pub environment: Environment,
    pub tags: Vec<String>,
    pub key_mode: KeyMode,
    pub status: CredentialStatus,
    pub rotation_interval_days: u16,
    pub created_at: DateTime<Utc>,
    pub last_rotated_at: DateTime<Utc>,
    pub rotation_due_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: u64,
}

impl From<&CredentialRecord> for CredentialSummary {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            id: record.id.clone(),
            owner_id: record.owner_id.clone(),
            name: record.name.clone(),
            service: record.service.clone(),
            description: record.description.clone(),
            environment: record.environment,
            tags: record.tags.clone(),
            key_mode: record.sealed.key_mode(),
            status: record.status,
            rotation_interval_days: record.rotation_interval.days(),
            created_at: record.created_at,
            last_rotated_at: record.last_rotated_at,
            rotation_due_at: record.rotation_due_at(),
            last_used_at: record.last_used_at,
            usage_count: record.usage_count,
        }
    }
}

/// Owner-editable metadata changes. `None` leaves a field untouched.
///
/// Values are expected to be validated already; stores apply them as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub environment: Option<Environment>,
    pub tags: Option<Vec<String>>,
    pub rotation_interval: Option<RotationInterval>,
}

impl CredentialUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.environment.is_none()
            && self.tags.is_none()
            && self.rotation_interval.is_none()
    }
}

/// The non-secret view of a credential consumed by the rotation policy engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationCandidate {
    pub id: CredentialId,
    pub owner_id: String,
    pub name: String,
    pub status: CredentialStatus,
    pub rotation_interval: RotationInterval,
    pub last_rotated_at: DateTime<Utc>,
}

impl From<&CredentialRecord> for RotationCandidate {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            id: record.id.clone(),
            owner_id: record.owner_id.clone(),
            name: record.name.clone(),
            status: record.status,
            rotation_interval: record.rotation_interval,
            last_rotated_at: record.last_rotated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_display_and_parse_are_lowercase() {
        for status in [
            CredentialStatus::Active,
            CredentialStatus::Inactive,
            CredentialStatus::Expired,
        ] {
            let s = status.to_string();
            assert_eq!(s, s.to_lowercase());
            assert_eq!(CredentialStatus::from_str(&s).unwrap(), status);
        }
        let json = serde_json::to_string(&CredentialStatus::Expired).unwrap();
        assert_eq!(json, "\"expired\"");
    }

    #[test]
    fn rotation_interval_bounds() {
        assert!(RotationInterval::new(0).is_err());
        assert!(RotationInterval::new(366).is_err());
        assert_eq!(RotationInterval::new(1).unwrap().days(), 1);
        assert_eq!(RotationInterval::new(365).unwrap().days(), 365);
        assert_eq!(RotationInterval::default().days(), 90);
    }

    #[test]
    fn rotation_interval_rejects_out_of_range_on_deserialize() {
        let parsed: Result<RotationInterval, _> = serde_json::from_str("400");
        assert!(parsed.is_err());
        let parsed: RotationInterval = serde_json::from_str("30").unwrap();
        assert_eq!(parsed.days(), 30);
    }

    #[test]
    fn environment_parses_lowercase_and_defaults_to_development() {
        assert_eq!(Environment::default(), Environment::Development);
        assert_eq!(
            Environment::from_str("production").unwrap(),
            Environment::Production
        );
        assert!(Environment::from_str("prod").is_err());
        assert_eq!(Environment::Staging.to_string(), "staging");
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(CredentialUpdate::default().is_empty());
        let clear_description = CredentialUpdate {
            description: Some(None),
            ..CredentialUpdate::default()
        };
        assert!(!clear_description.is_empty());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(CredentialId::generate(), CredentialId::generate());
    }
}
