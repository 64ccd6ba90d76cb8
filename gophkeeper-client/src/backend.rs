//! HTTP client for the gophkeeper server.
//!
//! Maps transport failures onto domain errors: connection problems become
//! [`ClientError::ServerUnavailable`] (the local store then stands as the
//! source of truth until the next sync), auth and uniqueness rejections carry
//! the server's message, anything else is an opaque transport error.

use crate::error::ClientError;
use async_trait::async_trait;
use gophkeeper_core::api::{AuthResponse, Credentials, ErrorBody};
use gophkeeper_core::{EncodedSecret, SecretSyncMeta, User};
use std::sync::RwLock;
use uuid::Uuid;

/// The remote half of the store, as seen by the controller and the sync
/// engine. Tests substitute an in-memory implementation.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn login(&self, login: &str, password: &str) -> Result<(String, User), ClientError>;
    async fn register(&self, login: &str, password: &str) -> Result<(String, User), ClientError>;

    /// Set the bearer token attached to every authenticated call.
    fn set_token(&self, token: &str);
    fn clear_token(&self);

    async fn get_secret_sync_meta(&self) -> Result<Vec<SecretSyncMeta>, ClientError>;
    async fn get_secret_sync_meta_by_name(
        &self,
        name: &str,
    ) -> Result<SecretSyncMeta, ClientError>;
    async fn get_secret_by_id(&self, id: &Uuid) -> Result<EncodedSecret, ClientError>;
    async fn save_encoded_secret(&self, secret: &EncodedSecret) -> Result<(), ClientError>;
    async fn delete_secret(&self, id: &Uuid) -> Result<(), ClientError>;
}

/// reqwest-backed [`RemoteStore`].
pub struct HttpBackendClient {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpBackendClient {
    /// `accept_self_signed` tolerates the self-signed certificates the
    /// HTTPS deployment mode uses.
    pub fn new(base_url: &str, accept_self_signed: bool) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .danger_accept_invalid_certs(accept_self_signed)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self.token.read().ok().and_then(|t| t.clone());
        match token {
            Some(token) => request.header("authorization", token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request.send().await.map_err(map_send_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|_| status.to_string());

        match status.as_u16() {
            401 | 409 => Err(ClientError::Remote(message)),
            _ => Err(ClientError::Transport(format!("{status}: {message}"))),
        }
    }

    async fn authenticate(&self, path: &str, login: &str, password: &str) -> Result<(String, User), ClientError> {
        let body = Credentials {
            login: login.to_string(),
            password: password.to_string(),
        };
        let response = self.send(self.http.post(self.url(path)).json(&body)).await?;
        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok((auth.token, auth.user))
    }
}

fn map_send_error(e: reqwest::Error) -> ClientError {
    if e.is_connect() || e.is_timeout() {
        ClientError::ServerUnavailable
    } else {
        ClientError::Transport(e.to_string())
    }
}

#[async_trait]
impl RemoteStore for HttpBackendClient {
    async fn login(&self, login: &str, password: &str) -> Result<(String, User), ClientError> {
        self.authenticate("/api/v1/login", login, password).await
    }

    async fn register(&self, login: &str, password: &str) -> Result<(String, User), ClientError> {
        self.authenticate("/api/v1/register", login, password).await
    }

    fn set_token(&self, token: &str) {
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(token.to_string());
        }
    }

    fn clear_token(&self) {
        if let Ok(mut slot) = self.token.write() {
            *slot = None;
        }
    }

    async fn get_secret_sync_meta(&self) -> Result<Vec<SecretSyncMeta>, ClientError> {
        let request = self.authorize(self.http.get(self.url("/api/v1/secrets/sync-meta")));
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn get_secret_sync_meta_by_name(
        &self,
        name: &str,
    ) -> Result<SecretSyncMeta, ClientError> {
        let request = self.authorize(
            self.http
                .get(self.url(&format!("/api/v1/secrets/sync-meta/{name}"))),
        );
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn get_secret_by_id(&self, id: &Uuid) -> Result<EncodedSecret, ClientError> {
        let request = self.authorize(self.http.get(self.url(&format!("/api/v1/secrets/{id}"))));
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn save_encoded_secret(&self, secret: &EncodedSecret) -> Result<(), ClientError> {
        let request = self.authorize(self.http.put(self.url("/api/v1/secrets")).json(secret));
        self.send(request).await?;
        Ok(())
    }

    async fn delete_secret(&self, id: &Uuid) -> Result<(), ClientError> {
        let request =
            self.authorize(self.http.delete(self.url(&format!("/api/v1/secrets/{id}"))));
        self.send(request).await?;
        Ok(())
    }
}
