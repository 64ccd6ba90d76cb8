//! Client error types.

use gophkeeper_core::{CodecError, SecretError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("server is not available")]
    ServerUnavailable,

    /// Domain error relayed from the server (auth failures, login in use).
    #[error("{0}")]
    Remote(String),

    /// Any other transport-level failure.
    #[error("unexpected server response: {0}")]
    Transport(String),

    #[error("item not found")]
    ItemNotFound,

    #[error("database error: {0}")]
    Database(String),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error("user is not authenticated")]
    NotAuthenticated,

    #[error("synchronization cancelled")]
    Cancelled,

    #[error("{0}")]
    InvalidInput(String),
}

impl From<CodecError> for ClientError {
    fn from(e: CodecError) -> Self {
        Self::Secret(SecretError::Codec(e))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::Secret(SecretError::Io(e))
    }
}

impl From<rusqlite::Error> for ClientError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => Self::ItemNotFound,
            other => Self::Database(other.to_string()),
        }
    }
}
