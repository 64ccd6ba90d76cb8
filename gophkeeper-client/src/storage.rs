//! Local replica of the user's secrets, plus the user record itself.
//!
//! A sqlite file under the base directory with the same logical schema as the
//! server, so the sync engine can compare the two stores directly.

use crate::error::ClientError;
use gophkeeper_core::{EncodedSecret, SecretItemInfo, SecretSyncMeta, SecretType, User};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const DATABASE_NAME: &str = "gophkeeper.db";

/// Thread-safe local storage handle.
#[derive(Clone)]
pub struct LocalStorage {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStorage {
    /// Open (or create) the database under `base_dir`.
    pub fn open(base_dir: &Path) -> Result<Self, anyhow::Error> {
        let conn = Connection::open(base_dir.join(DATABASE_NAME))?;
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
                client_id          INTEGER PRIMARY KEY,
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
                UNIQUE (owner, name)
            );

            CREATE INDEX IF NOT EXISTS idx_secrets_owner ON secrets(owner);",
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ClientError> {
        self.conn
            .lock()
            .map_err(|e| ClientError::Database(format!("lock error: {e}")))
    }

    /// Insert the replicated user record. The id comes from the server.
    pub fn save_user(&self, user: &User) -> Result<(), ClientError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO clients (client_id, username, password, date_last_modified)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![user.id, user.login, user.password_hash, user.timestamp],
        )?;
        Ok(())
    }

    pub fn update_user(&self, user: &User) -> Result<(), ClientError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE clients SET username = ?1, password = ?2, date_last_modified = ?3
             WHERE client_id = ?4",
            rusqlite::params![user.login, user.password_hash, user.timestamp, user.id],
        )?;
        Ok(())
    }

    pub fn get_user_by_id(&self, user_id: i64) -> Result<User, ClientError> {
        let conn = self.conn()?;
        let user = conn.query_row(
            "SELECT client_id, username, password, date_last_modified
             FROM clients WHERE client_id = ?1",
            [user_id],
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

    /// Sync metadata for all secrets owned by `owner`.
    pub fn sync_meta_by_owner(&self, owner: i64) -> Result<Vec<SecretSyncMeta>, ClientError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT secret_id, hash, date_last_modified FROM secrets WHERE owner = ?1",
        )?;

        let metas = stmt
            .query_map([owner], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
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
            .collect::<Result<Vec<_>, ClientError>>()?;

        Ok(metas)
    }

    /// Upsert by id, so re-saving a secret pulled from the server is
    /// idempotent.
    pub fn save_encoded_secret(&self, secret: &EncodedSecret) -> Result<(), ClientError> {
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

    pub fn get_secret_by_id(&self, id: &Uuid) -> Result<EncodedSecret, ClientError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT secret_id, owner, name, hash, description, enc_data, type, date_last_modified
             FROM secrets WHERE secret_id = ?1",
            [id.to_string()],
            row_to_secret,
        )
        .map_err(ClientError::from)
    }

    pub fn get_secret_by_name(&self, name: &str) -> Result<EncodedSecret, ClientError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT secret_id, owner, name, hash, description, enc_data, type, date_last_modified
             FROM secrets WHERE name = ?1",
            [name],
            row_to_secret,
        )
        .map_err(ClientError::from)
    }

    /// Listing rows for every secret owned by `owner`.
    pub fn secret_infos_by_owner(&self, owner: i64) -> Result<Vec<SecretItemInfo>, ClientError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT name, description, type FROM secrets WHERE owner = ?1")?;

        let infos = stmt
            .query_map([owner], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(name, description, ty)| {
                let secret_type = SecretType::parse(&ty)
                    .ok_or_else(|| ClientError::Database(format!("unknown secret type: {ty}")))?;
                Ok(SecretItemInfo {
                    name,
                    description,
                    secret_type,
                })
            })
            .collect::<Result<Vec<_>, ClientError>>()?;

        Ok(infos)
    }

    /// Delete a secret by name and return its id for the remote delete.
    /// The read and the delete run in one transaction.
    pub fn delete_secret_by_name(&self, name: &str) -> Result<Uuid, ClientError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| ClientError::Database(e.to_string()))?;

        let id: String = tx
            .query_row("SELECT secret_id FROM secrets WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => ClientError::ItemNotFound,
                other => ClientError::Database(other.to_string()),
            })?;

        tx.execute("DELETE FROM secrets WHERE name = ?1", [name])?;
        tx.commit().map_err(|e| ClientError::Database(e.to_string()))?;

        parse_secret_id(&id)
    }
}

fn parse_secret_id(id: &str) -> Result<Uuid, ClientError> {
    Uuid::parse_str(id).map_err(|_| ClientError::Database(format!("invalid secret id: {id}")))
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
