//! Client orchestration: session lifecycle, secret CRUD and sync invocation.
//!
//! The controller owns the passphrase-derived key for the duration of a
//! session. Secrets are always written locally first; remote replication
//! failures caused by an unreachable server leave the local result standing
//! and the next sync tick catches the remote up.

use crate::backend::RemoteStore;
use crate::error::ClientError;
use crate::storage::LocalStorage;
use crate::sync::SyncEngine;
use gophkeeper_core::{
    AesGcmCodec, CodecError, SecretItem, SecretItemInfo, User,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

/// How a mutation ended up across the two stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Applied locally and on the server.
    Replicated,
    /// Applied locally; the server was unavailable and will catch up on the
    /// next sync.
    Pending,
}

struct Session {
    user_id: i64,
    login: String,
    /// Kept for the session per the source design; wiped on drop.
    _passphrase: Zeroizing<String>,
    codec: AesGcmCodec,
}

pub struct Controller {
    remote: Arc<dyn RemoteStore>,
    local: LocalStorage,
    engine: SyncEngine,
    session: tokio::sync::Mutex<Option<Session>>,
}

impl Controller {
    pub fn new(remote: Arc<dyn RemoteStore>, local: LocalStorage) -> Self {
        let engine = SyncEngine::new(remote.clone(), local.clone());
        Self {
            remote,
            local,
            engine,
            session: tokio::sync::Mutex::new(None),
        }
    }

    /// Authenticate against the server, replicate the user record, run one
    /// synchronous sync and derive the session key. A failure after the
    /// remote login leaves no session behind.
    pub async fn login(
        &self,
        login: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ClientError> {
        let (token, user) = self.remote.login(login, password).await?;
        self.replicate_user(&user)?;
        self.remote.set_token(&token);

        match self.engine.synchronize(user.id, cancel).await {
            Ok(()) => {}
            Err(e) => {
                self.remote.clear_token();
                return Err(e);
            }
        }

        self.open_session(user.id, login, password).await;
        Ok(())
    }

    /// Validate the password policy client-side, register remotely, store the
    /// user locally and open the session.
    pub async fn register(
        &self,
        login: &str,
        password: &str,
        repeated_password: &str,
    ) -> Result<(), ClientError> {
        validate_password(password, repeated_password)?;

        let (token, user) = self.remote.register(login, password).await?;
        self.local.save_user(&user)?;
        self.remote.set_token(&token);

        self.open_session(user.id, login, password).await;
        Ok(())
    }

    /// Encode and store a secret, then replicate it.
    pub async fn save_secret(&self, item: &SecretItem) -> Result<SaveOutcome, ClientError> {
        let encoded = {
            let session = self.session.lock().await;
            let session = session.as_ref().ok_or(CodecError::NotReady)?;
            item.encode(&session.codec, session.user_id)?
        };

        self.local.save_encoded_secret(&encoded)?;

        match self.remote.save_encoded_secret(&encoded).await {
            Ok(()) => Ok(SaveOutcome::Replicated),
            Err(ClientError::ServerUnavailable) => Ok(SaveOutcome::Pending),
            Err(e) => Err(e),
        }
    }

    /// Listing of the session user's secrets, from the local store only.
    pub async fn list_secrets(&self) -> Result<Vec<SecretItemInfo>, ClientError> {
        let session = self.session.lock().await;
        let session = session.as_ref().ok_or(ClientError::NotAuthenticated)?;
        self.local.secret_infos_by_owner(session.user_id)
    }

    /// Read a secret by name from the local store and decrypt it.
    pub async fn get_secret(&self, name: &str) -> Result<SecretItem, ClientError> {
        let session = self.session.lock().await;
        let session = session.as_ref().ok_or(CodecError::NotReady)?;

        let encoded = self.local.get_secret_by_name(name)?;
        Ok(encoded.decode(&session.codec)?)
    }

    /// Delete locally (returning the id) and then remotely. Local deletion
    /// stands even when the server cannot be reached.
    pub async fn delete_secret(&self, name: &str) -> Result<SaveOutcome, ClientError> {
        {
            let session = self.session.lock().await;
            session.as_ref().ok_or(ClientError::NotAuthenticated)?;
        }

        let id = self.local.delete_secret_by_name(name)?;

        match self.remote.delete_secret(&id).await {
            Ok(()) => Ok(SaveOutcome::Replicated),
            Err(ClientError::ServerUnavailable) => Ok(SaveOutcome::Pending),
            Err(e) => Err(e),
        }
    }

    /// Run one reconciliation pass for the session user. A no-op without a
    /// session.
    pub async fn synchronize(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        let owner = self.session.lock().await.as_ref().map(|s| s.user_id);
        match owner {
            Some(owner) => self.engine.synchronize(owner, cancel).await,
            None => Ok(()),
        }
    }

    /// End the session. Dropping it wipes the passphrase and derived key.
    pub async fn logout(&self) {
        *self.session.lock().await = None;
        self.remote.clear_token();
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.lock().await.is_some()
    }

    pub async fn session_login(&self) -> Option<String> {
        self.session.lock().await.as_ref().map(|s| s.login.clone())
    }

    async fn open_session(&self, user_id: i64, login: &str, password: &str) {
        *self.session.lock().await = Some(Session {
            user_id,
            login: login.to_string(),
            _passphrase: Zeroizing::new(password.to_string()),
            codec: AesGcmCodec::new(password),
        });
    }

    /// Mirror the server's user record into the local store: insert when
    /// absent, update when changed.
    fn replicate_user(&self, user: &User) -> Result<(), ClientError> {
        match self.local.get_user_by_id(user.id) {
            Ok(local_user) => {
                if &local_user != user {
                    self.local.update_user(user)?;
                }
                Ok(())
            }
            Err(ClientError::ItemNotFound) => self.local.save_user(user),
            Err(e) => Err(e),
        }
    }
}

/// Client-side registration policy: equal passwords, at least three letters
/// and one digit. The error message promises a stricter rule than the check
/// enforces; both ship as is.
fn validate_password(password: &str, repeated_password: &str) -> Result<(), ClientError> {
    if password != repeated_password {
        return Err(ClientError::InvalidInput(
            "passwords are not equal".to_string(),
        ));
    }

    let letters = password.chars().filter(|c| c.is_alphabetic()).count();
    let has_digit = password.chars().any(|c| c.is_numeric());

    if letters < 3 || !has_digit {
        return Err(ClientError::InvalidInput(
            "password must contain at least 8 characters and 1 number".to_string(),
        ));
    }

    Ok(())
}
