//! SQLite-backed store implementations.
//!
//! The uniqueness contracts map directly onto primary-key constraints, so
//! the atomic unique-insert the replay guard depends on is provided by
//! SQLite itself. A constraint violation surfaces as
//! [`StorageError::AlreadyExists`].
//!
//! Single connection behind a mutex: every operation here is a single-row
//! insert, update, or point read, so there is nothing to gain from a pool.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::traits::{DataKeyStore, NonceStore, SecretStore};
use crate::types::{ApplicationDataKeyRecord, ApplicationSecretRecord, NonceRecord};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS application_secrets (
    application_id TEXT NOT NULL,
    version        INTEGER NOT NULL,
    wrapped_secret BLOB NOT NULL,
    is_active      INTEGER NOT NULL,
    created_at     INTEGER NOT NULL,
    PRIMARY KEY (application_id, version)
);
CREATE TABLE IF NOT EXISTS application_data_keys (
    application_id TEXT NOT NULL,
    key_version    INTEGER NOT NULL,
    wrapped_key    BLOB NOT NULL,
    created_at     INTEGER NOT NULL,
    PRIMARY KEY (application_id, key_version)
);
CREATE TABLE IF NOT EXISTS nonces (
    application_id TEXT NOT NULL,
    nonce          TEXT NOT NULL,
    expires_at     INTEGER NOT NULL,
    PRIMARY KEY (application_id, nonce)
);
";

/// SQLite store implementing all three persistence contracts.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (and migrates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path).map_err(internal)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory store. Each call returns an independent database.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory().map_err(internal)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(SCHEMA).map_err(internal)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn internal(err: rusqlite::Error) -> StorageError {
    StorageError::internal(err.to_string())
}

/// Maps a constraint violation to `AlreadyExists`; everything else is an
/// internal error.
fn insert_error(err: rusqlite::Error, key: String) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StorageError::AlreadyExists { key }
        }
        _ => internal(err),
    }
}

fn millis_to_utc(millis: i64) -> StorageResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| StorageError::Serialization {
            message: format!("timestamp out of range: {millis}"),
        })
}

fn parse_uuid(text: &str) -> StorageResult<Uuid> {
    Uuid::parse_str(text).map_err(|e| StorageError::Serialization {
        message: format!("malformed uuid in storage: {e}"),
    })
}

#[async_trait]
impl SecretStore for SqliteStore {
    async fn insert_secret(&self, record: &ApplicationSecretRecord) -> StorageResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO application_secrets
                 (application_id, version, wrapped_secret, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.application_id.to_string(),
                record.version,
                record.wrapped_secret,
                record.is_active,
                record.created_at.timestamp_millis(),
            ],
        )
        .map_err(|e| insert_error(e, record.storage_key()))?;
        Ok(())
    }

    async fn get_secret(
        &self,
        application_id: Uuid,
        version: u32,
    ) -> StorageResult<Option<ApplicationSecretRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT application_id, version, wrapped_secret, is_active, created_at
                 FROM application_secrets
                 WHERE application_id = ?1 AND version = ?2",
                params![application_id.to_string(), version],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, bool>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(internal)?;

        row.map(|(app, version, wrapped_secret, is_active, created_at)| {
            Ok(ApplicationSecretRecord {
                application_id: parse_uuid(&app)?,
                version,
                wrapped_secret,
                is_active,
                created_at: millis_to_utc(created_at)?,
            })
        })
        .transpose()
    }

    async fn latest_version(&self, application_id: Uuid) -> StorageResult<Option<u32>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT MAX(version) FROM application_secrets WHERE application_id = ?1",
            params![application_id.to_string()],
            |row| row.get::<_, Option<u32>>(0),
        )
        .map_err(internal)
    }

    async fn set_active(
        &self,
        application_id: Uuid,
        version: u32,
        is_active: bool,
    ) -> StorageResult<()> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE application_secrets SET is_active = ?3
                 WHERE application_id = ?1 AND version = ?2",
                params![application_id.to_string(), version, is_active],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(StorageError::not_found(format!(
                "secrets/{application_id}:v{version}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DataKeyStore for SqliteStore {
    async fn create_key(&self, record: &ApplicationDataKeyRecord) -> StorageResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO application_data_keys
                 (application_id, key_version, wrapped_key, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.application_id.to_string(),
                record.key_version,
                record.wrapped_key,
                record.created_at.timestamp_millis(),
            ],
        )
        .map_err(|e| insert_error(e, record.storage_key()))?;
        Ok(())
    }

    async fn get_key(
        &self,
        application_id: Uuid,
        key_version: u32,
    ) -> StorageResult<Option<ApplicationDataKeyRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT application_id, key_version, wrapped_key, created_at
                 FROM application_data_keys
                 WHERE application_id = ?1 AND key_version = ?2",
                params![application_id.to_string(), key_version],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(internal)?;

        row.map(|(app, key_version, wrapped_key, created_at)| {
            Ok(ApplicationDataKeyRecord {
                application_id: parse_uuid(&app)?,
                key_version,
                wrapped_key,
                created_at: millis_to_utc(created_at)?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl NonceStore for SqliteStore {
    async fn try_insert(&self, record: &NonceRecord) -> StorageResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO nonces (application_id, nonce, expires_at) VALUES (?1, ?2, ?3)",
            params![
                record.application_id.to_string(),
                record.nonce,
                record.expires_at.timestamp_millis(),
            ],
        )
        .map_err(|e| insert_error(e, record.storage_key()))?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let conn = self.conn.lock();
        let removed = conn
            .execute(
                "DELETE FROM nonces WHERE expires_at <= ?1",
                params![now.timestamp_millis()],
            )
            .map_err(internal)?;
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn secret(app: Uuid, version: u32) -> ApplicationSecretRecord {
        ApplicationSecretRecord {
            application_id: app,
            version,
            wrapped_secret: vec![0xAA; 60],
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn secret_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let app = Uuid::new_v4();
        store.insert_secret(&secret(app, 1)).await.unwrap();

        let loaded = store.get_secret(app, 1).await.unwrap().unwrap();
        assert_eq!(loaded.application_id, app);
        assert_eq!(loaded.wrapped_secret, vec![0xAA; 60]);
        assert!(loaded.is_active);

        assert!(store.get_secret(app, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_secret_version_is_constraint_violation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let app = Uuid::new_v4();
        store.insert_secret(&secret(app, 1)).await.unwrap();
        let err = store.insert_secret(&secret(app, 1)).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn latest_version_tracks_rotation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let app = Uuid::new_v4();
        assert_eq!(store.latest_version(app).await.unwrap(), None);
        store.insert_secret(&secret(app, 1)).await.unwrap();
        store.insert_secret(&secret(app, 2)).await.unwrap();
        assert_eq!(store.latest_version(app).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn set_active_requires_existing_version() {
        let store = SqliteStore::open_in_memory().unwrap();
        let app = Uuid::new_v4();
        store.insert_secret(&secret(app, 1)).await.unwrap();

        store.set_active(app, 1, false).await.unwrap();
        assert!(!store.get_secret(app, 1).await.unwrap().unwrap().is_active);

        let err = store.set_active(app, 2, false).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn data_key_race_loser_sees_already_exists() {
        let store = SqliteStore::open_in_memory().unwrap();
        let app = Uuid::new_v4();
        let record = ApplicationDataKeyRecord {
            application_id: app,
            key_version: 1,
            wrapped_key: vec![1; 60],
            created_at: Utc::now(),
        };
        store.create_key(&record).await.unwrap();
        let err = store.create_key(&record).await.unwrap_err();
        assert!(err.is_already_exists());

        let loaded = store.get_key(app, 1).await.unwrap().unwrap();
        assert_eq!(loaded.wrapped_key, vec![1; 60]);
    }

    #[tokio::test]
    async fn nonce_unique_insert_and_purge() {
        let store = SqliteStore::open_in_memory().unwrap();
        let app = Uuid::new_v4();
        let now = Utc::now();
        let record = NonceRecord {
            application_id: app,
            nonce: "nonce-abc".into(),
            expires_at: now + Duration::minutes(5),
        };
        store.try_insert(&record).await.unwrap();
        assert!(store.try_insert(&record).await.unwrap_err().is_already_exists());

        // Same nonce under another application is a different key.
        let other = NonceRecord {
            application_id: Uuid::new_v4(),
            ..record.clone()
        };
        store.try_insert(&other).await.unwrap();

        let removed = store.purge_expired(now + Duration::minutes(6)).await.unwrap();
        assert_eq!(removed, 2);
        store.try_insert(&record).await.unwrap();
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faultline.db");
        let app = Uuid::new_v4();
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_secret(&secret(app, 1)).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.get_secret(app, 1).await.unwrap().is_some());
    }
}
