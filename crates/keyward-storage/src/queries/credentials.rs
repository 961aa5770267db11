// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential CRUD operations.
//!
//! Listing paths select metadata columns only; `sealed` is read solely by
//! [`get_credential`].

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use keyward_core::{
    CredentialId, CredentialRecord, CredentialStatus, CredentialSummary, CredentialUpdate,
    Environment, KeyMode, KeywardError, RotationCandidate, RotationInterval, SealedCredential,
};
use rusqlite::types::Type;
use rusqlite::{params, Row};

use crate::database::{map_tr_err, Database};

const SUMMARY_COLUMNS: &str = "id, owner_id, name, service, key_mode, status, \
     rotation_interval_days, created_at, last_rotated_at, description, environment, tags, \
     last_used_at, usage_count";

const CANDIDATE_COLUMNS: &str = "id, owner_id, name, status, rotation_interval_days, last_rotated_at";

/// Insert a new credential.
pub async fn insert_credential(db: &Database, record: &CredentialRecord) -> Result<(), KeywardError> {
    let id = record.id.0.clone();
    let owner_id = record.owner_id.clone();
    let name = record.name.clone();
    let service = record.service.clone();
    let key_mode = record.sealed.key_mode().to_string();
    let sealed = record.sealed.encode();
    let interval = record.rotation_interval.days();
    let status = record.status.to_string();
    let created_at = timestamp(record.created_at);
    let last_rotated_at = timestamp(record.last_rotated_at);
    let description = record.description.clone();
    let environment = record.environment.to_string();
    let tags = encode_tags(&record.tags)?;
    let last_used_at = record.last_used_at.map(timestamp);
    let usage_count = count_to_sql(record.usage_count);

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO credentials (id, owner_id, name, service, key_mode, sealed, \
                 rotation_interval_days, status, created_at, last_rotated_at, description, \
                 environment, tags, last_used_at, usage_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    id,
                    owner_id,
                    name,
                    service,
                    key_mode,
                    sealed,
                    interval,
                    status,
                    created_at,
                    last_rotated_at,
                    description,
                    environment,
                    tags,
                    last_used_at,
                    usage_count,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a full credential, sealed value included.
pub async fn get_credential(
    db: &Database,
    id: &CredentialId,
) -> Result<Option<CredentialRecord>, KeywardError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, name, service, sealed, rotation_interval_days, status, \
                 created_at, last_rotated_at, description, environment, tags, last_used_at, \
                 usage_count
                 FROM credentials WHERE id = ?1",
            )?;
            let result = stmt.query_row(params![id], |row| {
                Ok(CredentialRecord {
                    id: CredentialId(row.get(0)?),
                    owner_id: row.get(1)?,
                    name: row.get(2)?,
                    service: row.get(3)?,
                    sealed: parse_sealed(row, 4)?,
                    rotation_interval: parse_interval(row, 5)?,
                    status: parse_enum(row, 6)?,
                    created_at: parse_timestamp(row, 7)?,
                    last_rotated_at: parse_timestamp(row, 8)?,
                    description: row.get(9)?,
                    environment: parse_enum(row, 10)?,
                    tags: parse_tags(row, 11)?,
                    last_used_at: parse_optional_timestamp(row, 12)?,
                    usage_count: parse_count(row, 13)?,
                })
            });
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List credential metadata, newest first, optionally for one owner.
pub async fn list_credentials(
    db: &Database,
    owner_id: Option<&str>,
) -> Result<Vec<CredentialSummary>, KeywardError> {
    let owner_id = owner_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {SUMMARY_COLUMNS} FROM credentials
                 WHERE ?1 IS NULL OR owner_id = ?1
                 ORDER BY created_at DESC, id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![owner_id], summary_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Rotation view of every credential in `status`.
pub async fn list_candidates(
    db: &Database,
    status: CredentialStatus,
) -> Result<Vec<RotationCandidate>, KeywardError> {
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {CANDIDATE_COLUMNS} FROM credentials WHERE status = ?1 ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![status], |row| {
                Ok(RotationCandidate {
                    id: CredentialId(row.get(0)?),
                    owner_id: row.get(1)?,
                    name: row.get(2)?,
                    status: parse_enum(row, 3)?,
                    rotation_interval: parse_interval(row, 4)?,
                    last_rotated_at: parse_timestamp(row, 5)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Replace the sealed value.
///
/// A rotation (`rotated_at` set) also revives an expired record. The status
/// is decided from the row being updated, never from an earlier read.
pub async fn replace_secret(
    db: &Database,
    id: &CredentialId,
    sealed: &SealedCredential,
    rotated_at: Option<DateTime<Utc>>,
) -> Result<bool, KeywardError> {
    let id = id.0.clone();
    let key_mode = sealed.key_mode().to_string();
    let sealed = sealed.encode();
    let rotated_at = rotated_at.map(timestamp);

    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE credentials
                 SET sealed = ?2, key_mode = ?3,
                     last_rotated_at = COALESCE(?4, last_rotated_at),
                     status = CASE
                         WHEN ?4 IS NOT NULL AND status = 'expired' THEN 'active'
                         ELSE status
                     END
                 WHERE id = ?1",
                params![id, sealed, key_mode, rotated_at],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Apply the fields present in `update`.
pub async fn update_metadata(
    db: &Database,
    id: &CredentialId,
    update: &CredentialUpdate,
) -> Result<bool, KeywardError> {
    let id = id.0.clone();
    let name = update.name.clone();
    let set_description = update.description.is_some();
    let description = update.description.clone().flatten();
    let environment = update.environment.map(|e| e.to_string());
    let tags = update.tags.as_deref().map(encode_tags).transpose()?;
    let interval = update.rotation_interval.map(RotationInterval::days);

    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE credentials
                 SET name = COALESCE(?2, name),
                     description = CASE WHEN ?3 THEN ?4 ELSE description END,
                     environment = COALESCE(?5, environment),
                     tags = COALESCE(?6, tags),
                     rotation_interval_days = COALESCE(?7, rotation_interval_days)
                 WHERE id = ?1",
                params![id, name, set_description, description, environment, tags, interval],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Bump the usage counter and stamp `last_used_at`.
pub async fn record_use(
    db: &Database,
    id: &CredentialId,
    at: DateTime<Utc>,
) -> Result<bool, KeywardError> {
    let id = id.0.clone();
    let at = timestamp(at);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE credentials
                 SET usage_count = usage_count + 1, last_used_at = ?2
                 WHERE id = ?1",
                params![id, at],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Owner status change; never touches an expired credential.
pub async fn set_status(
    db: &Database,
    id: &CredentialId,
    status: CredentialStatus,
) -> Result<bool, KeywardError> {
    let id = id.0.clone();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE credentials SET status = ?2 WHERE id = ?1 AND status != 'expired'",
                params![id, status],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Conditional `active -> expired` transition, guarded on the rotation
/// timestamp the caller evaluated.
pub async fn expire(
    db: &Database,
    id: &CredentialId,
    observed_rotation: DateTime<Utc>,
) -> Result<bool, KeywardError> {
    let id = id.0.clone();
    let observed = timestamp(observed_rotation);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE credentials SET status = 'expired'
                 WHERE id = ?1 AND status = 'active' AND last_rotated_at = ?2",
                params![id, observed],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a credential.
pub async fn delete_credential(db: &Database, id: &CredentialId) -> Result<bool, KeywardError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute("DELETE FROM credentials WHERE id = ?1", params![id])?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<CredentialSummary> {
    let rotation_interval = parse_interval(row, 6)?;
    let last_rotated_at = parse_timestamp(row, 8)?;
    Ok(CredentialSummary {
        id: CredentialId(row.get(0)?),
        owner_id: row.get(1)?,
        name: row.get(2)?,
        service: row.get(3)?,
        key_mode: parse_enum::<KeyMode>(row, 4)?,
        status: parse_enum(row, 5)?,
        rotation_interval_days: rotation_interval.days(),
        created_at: parse_timestamp(row, 7)?,
        last_rotated_at,
        rotation_due_at: last_rotated_at
            + chrono::Duration::days(i64::from(rotation_interval.days())),
        description: row.get(9)?,
        environment: parse_enum::<Environment>(row, 10)?,
        tags: parse_tags(row, 11)?,
        last_used_at: parse_optional_timestamp(row, 12)?,
        usage_count: parse_count(row, 13)?,
    })
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn encode_tags(tags: &[String]) -> Result<String, KeywardError> {
    serde_json::to_string(tags).map_err(KeywardError::storage)
}

/// SQLite integers are signed.
fn count_to_sql(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn parse_count(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw).map_err(|e| conversion_error(idx, e))
}

fn parse_tags(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn parse_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = strum::ParseError>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn parse_interval(row: &Row<'_>, idx: usize) -> rusqlite::Result<RotationInterval> {
    let days: u16 = row.get(idx)?;
    RotationInterval::new(days).map_err(|e| conversion_error(idx, e))
}

fn parse_sealed(row: &Row<'_>, idx: usize) -> rusqlite::Result<SealedCredential> {
    let raw: String = row.get(idx)?;
    SealedCredential::decode(&raw).map_err(|e| conversion_error(idx, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_test_utils::fixture_record;
    use tempfile::tempdir;

    async fn open_db(dir: &tempfile::TempDir) -> Database {
        let path = dir.path().join("creds.db");
        Database::open(path.to_str().unwrap(), true).await.unwrap()
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;
        let record = fixture_record("cred-a", 30, Utc::now(), CredentialStatus::Active);

        insert_credential(&db, &record).await.unwrap();
        let loaded = get_credential(&db, &record.id).await.unwrap().unwrap();

        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.sealed, record.sealed);
        assert_eq!(loaded.rotation_interval.days(), 30);
        // Stored at microsecond precision.
        assert_eq!(
            loaded.last_rotated_at.timestamp_micros(),
            record.last_rotated_at.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;
        assert!(get_credential(&db, &"nope".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expire_is_conditional() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;
        let at = Utc::now();
        let active = fixture_record("a", 30, at, CredentialStatus::Active);
        let inactive = fixture_record("i", 30, at, CredentialStatus::Inactive);
        insert_credential(&db, &active).await.unwrap();
        insert_credential(&db, &inactive).await.unwrap();

        assert!(expire(&db, &active.id, at).await.unwrap());
        assert!(!expire(&db, &active.id, at).await.unwrap());
        assert!(!expire(&db, &inactive.id, at).await.unwrap());
        assert!(!set_status(&db, &active.id, CredentialStatus::Active).await.unwrap());
    }

    #[tokio::test]
    async fn expire_skips_a_record_rotated_since_it_was_read() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;
        let observed = Utc::now() - chrono::Duration::days(100);
        let record = fixture_record("c", 90, observed, CredentialStatus::Active);
        insert_credential(&db, &record).await.unwrap();

        let candidate = list_candidates(&db, CredentialStatus::Active)
            .await
            .unwrap()
            .remove(0);
        assert!(replace_secret(&db, &record.id, &record.sealed, Some(Utc::now()))
            .await
            .unwrap());

        assert!(!expire(&db, &record.id, candidate.last_rotated_at).await.unwrap());
        let loaded = get_credential(&db, &record.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, CredentialStatus::Active);
    }

    #[tokio::test]
    async fn replace_secret_without_rotation_keeps_time_and_status() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;
        let record = fixture_record("r", 30, Utc::now(), CredentialStatus::Expired);
        insert_credential(&db, &record).await.unwrap();

        let mut sealed = record.sealed.clone();
        sealed.ciphertext = vec![9u8; 40];
        assert!(replace_secret(&db, &record.id, &sealed, None).await.unwrap());
        let loaded = get_credential(&db, &record.id).await.unwrap().unwrap();
        assert_eq!(loaded.sealed, sealed);
        assert_eq!(loaded.status, CredentialStatus::Expired);
        assert_eq!(
            loaded.last_rotated_at.timestamp_micros(),
            record.last_rotated_at.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn rotation_revives_expired_but_not_inactive() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;
        let old = Utc::now() - chrono::Duration::days(200);
        let expired = fixture_record("e", 30, old, CredentialStatus::Expired);
        let paused = fixture_record("p", 30, old, CredentialStatus::Inactive);
        insert_credential(&db, &expired).await.unwrap();
        insert_credential(&db, &paused).await.unwrap();

        let now = Utc::now();
        replace_secret(&db, &expired.id, &expired.sealed, Some(now)).await.unwrap();
        replace_secret(&db, &paused.id, &paused.sealed, Some(now)).await.unwrap();

        let expired = get_credential(&db, &expired.id).await.unwrap().unwrap();
        let paused = get_credential(&db, &paused.id).await.unwrap().unwrap();
        assert_eq!(expired.status, CredentialStatus::Active);
        assert_eq!(expired.last_rotated_at.timestamp_micros(), now.timestamp_micros());
        assert_eq!(paused.status, CredentialStatus::Inactive);
    }

    #[tokio::test]
    async fn metadata_update_touches_only_given_fields() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;
        let mut record = fixture_record("m", 30, Utc::now(), CredentialStatus::Active);
        record.description = Some("old text".into());
        record.tags = vec!["billing".into()];
        insert_credential(&db, &record).await.unwrap();

        let update = CredentialUpdate {
            environment: Some(Environment::Production),
            rotation_interval: Some(RotationInterval::new(60).unwrap()),
            ..CredentialUpdate::default()
        };
        assert!(update_metadata(&db, &record.id, &update).await.unwrap());
        let loaded = get_credential(&db, &record.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "m");
        assert_eq!(loaded.description.as_deref(), Some("old text"));
        assert_eq!(loaded.tags, vec!["billing".to_string()]);
        assert_eq!(loaded.environment, Environment::Production);
        assert_eq!(loaded.rotation_interval.days(), 60);

        let clear = CredentialUpdate {
            description: Some(None),
            tags: Some(Vec::new()),
            ..CredentialUpdate::default()
        };
        assert!(update_metadata(&db, &record.id, &clear).await.unwrap());
        let loaded = get_credential(&db, &record.id).await.unwrap().unwrap();
        assert_eq!(loaded.description, None);
        assert!(loaded.tags.is_empty());

        assert!(!update_metadata(&db, &"missing".into(), &clear).await.unwrap());
    }

    #[tokio::test]
    async fn record_use_counts_and_stamps() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;
        let record = fixture_record("u", 30, Utc::now(), CredentialStatus::Active);
        insert_credential(&db, &record).await.unwrap();

        let used_at = Utc::now();
        assert!(record_use(&db, &record.id, used_at).await.unwrap());
        assert!(record_use(&db, &record.id, used_at).await.unwrap());

        let summaries = list_credentials(&db, None).await.unwrap();
        assert_eq!(summaries[0].usage_count, 2);
        assert_eq!(
            summaries[0].last_used_at.map(|at| at.timestamp_micros()),
            Some(used_at.timestamp_micros())
        );
    }
}
