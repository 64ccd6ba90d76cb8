//! Server error types mapped to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("empty values are not allowed")]
    EmptyValue,

    #[error("invalid password")]
    InvalidPassword,

    #[error("the specified user is not registered in the system")]
    UserNotFound,

    #[error("login is already used")]
    LoginInUse,

    #[error("requested item belongs to another user")]
    OwnerMismatch,

    #[error("requested element not found")]
    NotFound,

    #[error("token is invalid")]
    TokenInvalid,

    #[error("authorization token is not set")]
    TokenMissing,

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::EmptyValue
            | Self::InvalidPassword
            | Self::UserNotFound
            | Self::TokenInvalid
            | Self::TokenMissing => StatusCode::UNAUTHORIZED,
            Self::LoginInUse => StatusCode::CONFLICT,
            Self::OwnerMismatch => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal detail stays in the log, not on the wire.
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "database failure");
                "internal server error".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "internal failure");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound,
            other => Self::Database(other.to_string()),
        }
    }
}
