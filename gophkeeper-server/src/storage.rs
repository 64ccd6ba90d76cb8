//! SQLite storage for user records and encoded secrets.
//!
//! The store never sees plaintext: secrets are opaque ciphertext blobs keyed
//! by id, indexed by owner and name. Every query touching an owned row keeps
//! the owner in the predicate, so cross-owner access is indistinguishable
//! from a missing row.

use crate::error::ServiceError;
use chrono::Utc;
use gophkeeper_core::{EncodedSecret, SecretSyncMeta, SecretType, User};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Thread-safe server storage handle.
#[derive(Clone)]
pub struct ServerStorage {
    conn: Arc<Mutex<Connection>>,
}

impl ServerStorage {
    pub fn open(path: &Path) -> Result<Self, anyhow::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    #[allow(dead_code)]
    pub fn in_memory() -> Result<Self, anyhow::Error> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    fn initialize_schema(&self) -> Result<(), anyhow::Error> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("{e}"))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS clients (
                client_id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username           TEXT NOT NULL UNIQUE,
                password           TEXT NOT NULL,
                date_last_modified INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS secrets (
                secret_id          TEXT PRIMARY KEY,
                owner              INTEGER NOT NULL,
                name               TEXT NOT NULL,
                hash               TEXT NOT NULL,
                description        TEXT NOT NULL,
                enc_data           BLOB NOT NULL,
                type               TEXT NOT NULL,
                date_last_modified INTEGER NOT NULL,
                UNIQUE (owner, name),
                FOREIGN KEY (owner) REFERENCES clients(client_id)
            );

            CREATE INDEX IF NOT EXISTS idx_secrets_owner ON secrets(owner);",
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ServiceError> {
        self.conn
            .lock()
            .map_err(|e| ServiceError::Internal(format!("lock error: {e}")))
    }

    /// Insert a new user. The modification timestamp is stamped here, by the
    /// server. A duplicate login maps to [`ServiceError::LoginInUse`].
    pub fn new_user(&self, login: &str, password_hash: &str) -> Result<User, ServiceError> {
        let conn = self.conn()?;
        let timestamp = Utc::now().timestamp_millis();

        conn.execute(
            "INSERT INTO clients (username, password, date_last_modified) VALUES (?1, ?2, ?3)",
            rusqlite::params![login, password_hash, timestamp],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ServiceError::LoginInUse
            }
            other => ServiceError::Database(other.to_string()),
        })?;

        Ok(User {
            id: conn.last_insert_rowid(),
            login: login.to_string(),
            password_hash: password_hash.to_string(),
            timestamp,
        })
    }

    pub fn get_user_by_login(&self, login: &str) -> Result<User, ServiceError> {
        let conn = self.conn()?;
        let user = conn.query_row(
            "SELECT client_id, username, password, date_last_modified
             FROM clients WHERE username = ?1",
            [login],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    login: row.get(1)?,
                    password_hash: row.get(2)?,
                    timestamp: row.get(3)?,
                })
            },
        )?;
        Ok(user)
    }

    /// All sync metadata owned by `user_id`. Order is unspecified.
    pub fn sync_meta_by_user(&self, user_id: i64) -> Result<Vec<SecretSyncMeta>, ServiceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT secret_id, hash, date_last_modified FROM secrets WHERE owner = ?1",
        )?;

        let metas = stmt
            .query_map([user_id], |row| {
                let id: String = row.get(0)?;
                Ok((id, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(id, hash, timestamp)| {
                Ok(SecretSyncMeta {
                    id: parse_secret_id(&id)?,
                    hash,
                    timestamp,
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        Ok(metas)
    }

    pub fn sync_meta_by_owner_and_name(
        &self,
        user_id: i64,
        name: &str,
    ) -> Result<SecretSyncMeta, ServiceError> {
        let conn = self.conn()?;
        let (id, hash, timestamp): (String, String, i64) = conn.query_row(
            "SELECT secret_id, hash, date_last_modified
             FROM secrets WHERE owner = ?1 AND name = ?2",
            rusqlite::params![user_id, name],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(SecretSyncMeta {
            id: parse_secret_id(&id)?,
            hash,
            timestamp,
        })
    }

    /// Fetch one secret. Ownership is enforced in the query predicate, so a
    /// foreign id reads exactly like a missing one.
    pub fn get_secret_by_id(
        &self,
        user_id: i64,
        secret_id: &Uuid,
    ) -> Result<EncodedSecret, ServiceError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT secret_id, owner, name, hash, description, enc_data, type, date_last_modified
             FROM secrets WHERE owner = ?1 AND secret_id = ?2",
            rusqlite::params![user_id, secret_id.to_string()],
            row_to_secret,
        )
        .map_err(ServiceError::from)
    }

    /// Upsert by id. On update the owner column is left untouched, pinning
    /// the record to the user that created it.
    pub fn save_encoded_secret(&self, secret: &EncodedSecret) -> Result<(), ServiceError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO secrets (secret_id, owner, name, hash, description, enc_data, type, date_last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(secret_id) DO UPDATE SET
                name = excluded.name,
                hash = excluded.hash,
                description = excluded.description,
                enc_data = excluded.enc_data,
                type = excluded.type,
                date_last_modified = excluded.date_last_modified",
            rusqlite::params![
                secret.id.to_string(),
                secret.owner,
                secret.name,
                secret.hash,
                secret.description,
                secret.encoded_content,
                secret.secret_type.as_str(),
                secret.timestamp,
            ],
        )?;
        Ok(())
    }

    /// Delete a secret owned by `user_id`. A missing row is not an error.
    pub fn delete_secret(&self, user_id: i64, secret_id: &Uuid) -> Result<(), ServiceError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM secrets WHERE owner = ?1 AND secret_id = ?2",
            rusqlite::params![user_id, secret_id.to_string()],
        )?;
        Ok(())
    }
}

fn parse_secret_id(id: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(id).map_err(|_| ServiceError::Database(format!("invalid secret id: {id}")))
}

fn row_to_secret(row: &rusqlite::Row<'_>) -> rusqlite::Result<EncodedSecret> {
    let id: String = row.get(0)?;
    let ty: String = row.get(6)?;

    Ok(EncodedSecret {
        id: Uuid::parse_str(&id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        owner: row.get(1)?,
        name: row.get(2)?,
        hash: row.get(3)?,
        description: row.get(4)?,
        encoded_content: row.get(5)?,
        secret_type: SecretType::parse(&ty).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                format!("unknown secret type: {ty}").into(),
            )
        })?,
        timestamp: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(owner: i64, name: &str) -> EncodedSecret {
        EncodedSecret {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner,
            description: "desc".to_string(),
            secret_type: SecretType::Text,
            encoded_content: vec![1, 2, 3],
            hash: "aGFzaA==".to_string(),
            timestamp: 100,
        }
    }

    fn storage_with_user(login: &str) -> (ServerStorage, User) {
        let storage = ServerStorage::in_memory().unwrap();
        let user = storage.new_user(login, "hash").unwrap();
        (storage, user)
    }

    #[test]
    fn new_user_assigns_id_and_timestamp() {
        let storage = ServerStorage::in_memory().unwrap();
        let user = storage.new_user("alice", "hash").unwrap();

        assert!(user.id > 0);
        assert!(user.timestamp > 0);
        assert_eq!(storage.get_user_by_login("alice").unwrap(), user);
    }

    #[test]
    fn duplicate_login_rejected() {
        let (storage, _) = storage_with_user("alice");
        assert!(matches!(
            storage.new_user("alice", "other"),
            Err(ServiceError::LoginInUse)
        ));
    }

    #[test]
    fn unknown_login_not_found() {
        let storage = ServerStorage::in_memory().unwrap();
        assert!(matches!(
            storage.get_user_by_login("ghost"),
            Err(ServiceError::NotFound)
        ));
    }

    #[test]
    fn save_then_get_by_owner() {
        let (storage, user) = storage_with_user("alice");
        let s = secret(user.id, "gmail");

        storage.save_encoded_secret(&s).unwrap();
        assert_eq!(storage.get_secret_by_id(user.id, &s.id).unwrap(), s);
    }

    #[test]
    fn cross_owner_access_reads_as_not_found() {
        let (storage, alice) = storage_with_user("alice");
        let bob = storage.new_user("bob", "hash").unwrap();

        let s = secret(alice.id, "gmail");
        storage.save_encoded_secret(&s).unwrap();

        assert!(matches!(
            storage.get_secret_by_id(bob.id, &s.id),
            Err(ServiceError::NotFound)
        ));
        assert!(storage.sync_meta_by_user(bob.id).unwrap().is_empty());
    }

    #[test]
    fn resave_is_an_upsert_that_pins_owner() {
        let (storage, user) = storage_with_user("alice");
        let mut s = secret(user.id, "gmail");
        storage.save_encoded_secret(&s).unwrap();

        s.hash = "bmV3aGFzaA==".to_string();
        s.timestamp = 200;
        s.owner = user.id + 999; // a forged owner must not take effect
        storage.save_encoded_secret(&s).unwrap();

        let stored = storage.get_secret_by_id(user.id, &s.id).unwrap();
        assert_eq!(stored.hash, "bmV3aGFzaA==");
        assert_eq!(stored.timestamp, 200);
        assert_eq!(stored.owner, user.id);
    }

    #[test]
    fn owner_and_name_unique() {
        let (storage, user) = storage_with_user("alice");
        storage.save_encoded_secret(&secret(user.id, "gmail")).unwrap();

        // Same name, same owner, different id: violates the name index.
        assert!(storage.save_encoded_secret(&secret(user.id, "gmail")).is_err());

        // Same name under another owner is fine.
        let bob = storage.new_user("bob", "hash").unwrap();
        storage.save_encoded_secret(&secret(bob.id, "gmail")).unwrap();
    }

    #[test]
    fn sync_meta_by_name_scoped_to_owner() {
        let (storage, user) = storage_with_user("alice");
        let s = secret(user.id, "gmail");
        storage.save_encoded_secret(&s).unwrap();

        let meta = storage.sync_meta_by_owner_and_name(user.id, "gmail").unwrap();
        assert_eq!(meta, s.sync_meta());

        let bob = storage.new_user("bob", "hash").unwrap();
        assert!(matches!(
            storage.sync_meta_by_owner_and_name(bob.id, "gmail"),
            Err(ServiceError::NotFound)
        ));
    }

    #[test]
    fn delete_respects_owner_and_tolerates_missing() {
        let (storage, alice) = storage_with_user("alice");
        let bob = storage.new_user("bob", "hash").unwrap();

        let s = secret(alice.id, "gmail");
        storage.save_encoded_secret(&s).unwrap();

        // Bob cannot delete Alice's secret; the call still succeeds.
        storage.delete_secret(bob.id, &s.id).unwrap();
        assert!(storage.get_secret_by_id(alice.id, &s.id).is_ok());

        storage.delete_secret(alice.id, &s.id).unwrap();
        assert!(storage.get_secret_by_id(alice.id, &s.id).is_err());

        // Deleting an id that no longer exists is not an error.
        storage.delete_secret(alice.id, &s.id).unwrap();
    }
}
