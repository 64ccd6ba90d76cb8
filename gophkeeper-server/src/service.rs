//! Application service: authentication and secret CRUD over the storage.

use crate::error::ServiceError;
use crate::storage::ServerStorage;
use crate::token::TokenManager;
use gophkeeper_core::{EncodedSecret, SecretSyncMeta, User};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct GophkeeperService {
    storage: ServerStorage,
    tokens: Arc<TokenManager>,
}

impl GophkeeperService {
    pub fn new(storage: ServerStorage, tokens: Arc<TokenManager>) -> Self {
        Self { storage, tokens }
    }

    /// Verify credentials against the stored bcrypt hash and issue a token.
    pub fn login(&self, login: &str, password: &str) -> Result<(String, User), ServiceError> {
        if login.is_empty() || password.is_empty() {
            return Err(ServiceError::EmptyValue);
        }

        let user = match self.storage.get_user_by_login(login) {
            Ok(user) => user,
            Err(ServiceError::NotFound) => return Err(ServiceError::UserNotFound),
            Err(e) => return Err(e),
        };

        let matches = bcrypt::verify(password, &user.password_hash)
            .map_err(|e| ServiceError::Internal(format!("bcrypt verify failed: {e}")))?;
        if !matches {
            return Err(ServiceError::InvalidPassword);
        }

        let token = self.tokens.issue(user.id)?;
        Ok((token, user))
    }

    /// Hash the password at the default cost, create the user and issue a
    /// token. Every failure propagates; there is no partial success.
    pub fn register(&self, login: &str, password: &str) -> Result<(String, User), ServiceError> {
        if login.is_empty() || password.is_empty() {
            return Err(ServiceError::EmptyValue);
        }

        let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| ServiceError::Internal(format!("bcrypt hash failed: {e}")))?;

        let user = self.storage.new_user(login, &password_hash)?;
        let token = self.tokens.issue(user.id)?;
        Ok((token, user))
    }

    pub fn sync_meta_by_user(&self, user_id: i64) -> Result<Vec<SecretSyncMeta>, ServiceError> {
        self.storage.sync_meta_by_user(user_id)
    }

    pub fn sync_meta_by_name(
        &self,
        user_id: i64,
        name: &str,
    ) -> Result<SecretSyncMeta, ServiceError> {
        self.storage.sync_meta_by_owner_and_name(user_id, name)
    }

    pub fn get_secret(&self, user_id: i64, secret_id: &Uuid) -> Result<EncodedSecret, ServiceError> {
        self.storage.get_secret_by_id(user_id, secret_id)
    }

    /// Persist a secret for the session user. A record claiming another
    /// owner is refused before it reaches the store.
    pub fn save_encoded_secret(
        &self,
        user_id: i64,
        secret: &EncodedSecret,
    ) -> Result<(), ServiceError> {
        if secret.owner != user_id {
            return Err(ServiceError::OwnerMismatch);
        }
        self.storage.save_encoded_secret(secret)
    }

    pub fn delete_secret(&self, user_id: i64, secret_id: &Uuid) -> Result<(), ServiceError> {
        self.storage.delete_secret(user_id, secret_id)
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }
}
