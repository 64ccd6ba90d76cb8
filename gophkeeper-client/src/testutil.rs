//! In-memory remote store used by sync-engine and controller tests.

use crate::backend::RemoteStore;
use crate::error::ClientError;
use async_trait::async_trait;
use gophkeeper_core::{EncodedSecret, SecretSyncMeta, User};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub(crate) struct MockRemote {
    /// login -> (plain password, user record)
    pub users: Mutex<HashMap<String, (String, User)>>,
    pub secrets: Mutex<HashMap<Uuid, EncodedSecret>>,
    pub saves: AtomicUsize,
    pub fetches: AtomicUsize,
    /// When set, every secret operation fails as if the server were down.
    pub unavailable: AtomicBool,
    pub token: Mutex<Option<String>>,
}

impl MockRemote {
    pub fn with_secrets(secrets: Vec<EncodedSecret>) -> Self {
        Self {
            secrets: Mutex::new(secrets.into_iter().map(|s| (s.id, s)).collect()),
            ..Self::default()
        }
    }

    pub fn secret(&self, id: &Uuid) -> Option<EncodedSecret> {
        self.secrets.lock().unwrap().get(id).cloned()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), ClientError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(ClientError::ServerUnavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn login(&self, login: &str, password: &str) -> Result<(String, User), ClientError> {
        self.check_available()?;
        let users = self.users.lock().unwrap();
        match users.get(login) {
            Some((stored, user)) if stored == password => {
                Ok((format!("token-{login}"), user.clone()))
            }
            Some(_) => Err(ClientError::Remote("invalid password".to_string())),
            None => Err(ClientError::Remote(
                "the specified user is not registered in the system".to_string(),
            )),
        }
    }

    async fn register(&self, login: &str, password: &str) -> Result<(String, User), ClientError> {
        self.check_available()?;
        let mut users = self.users.lock().unwrap();
        if users.contains_key(login) {
            return Err(ClientError::Remote("login is already used".to_string()));
        }
        let user = User {
            id: users.len() as i64 + 1,
            login: login.to_string(),
            password_hash: format!("hash-{password}"),
            timestamp: 1,
        };
        users.insert(login.to_string(), (password.to_string(), user.clone()));
        Ok((format!("token-{login}"), user))
    }

    fn set_token(&self, token: &str) {
        *self.token.lock().unwrap() = Some(token.to_string());
    }

    fn clear_token(&self) {
        *self.token.lock().unwrap() = None;
    }

    async fn get_secret_sync_meta(&self) -> Result<Vec<SecretSyncMeta>, ClientError> {
        self.check_available()?;
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .values()
            .map(|s| s.sync_meta())
            .collect())
    }

    async fn get_secret_sync_meta_by_name(
        &self,
        name: &str,
    ) -> Result<SecretSyncMeta, ClientError> {
        self.check_available()?;
        self.secrets
            .lock()
            .unwrap()
            .values()
            .find(|s| s.name == name)
            .map(|s| s.sync_meta())
            .ok_or(ClientError::ItemNotFound)
    }

    async fn get_secret_by_id(&self, id: &Uuid) -> Result<EncodedSecret, ClientError> {
        self.check_available()?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.secret(id).ok_or(ClientError::ItemNotFound)
    }

    async fn save_encoded_secret(&self, secret: &EncodedSecret) -> Result<(), ClientError> {
        self.check_available()?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.secrets
            .lock()
            .unwrap()
            .insert(secret.id, secret.clone());
        Ok(())
    }

    async fn delete_secret(&self, id: &Uuid) -> Result<(), ClientError> {
        self.check_available()?;
        self.secrets.lock().unwrap().remove(id);
        Ok(())
    }
}
