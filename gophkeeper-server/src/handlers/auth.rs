//! Login and register handlers (unauthenticated).

use crate::error::ServiceError;
use crate::service::GophkeeperService;
use axum::extract::State;
use axum::Json;
use gophkeeper_core::api::{AuthResponse, Credentials};

pub async fn login(
    State(service): State<GophkeeperService>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<AuthResponse>, ServiceError> {
    let (token, user) = service.login(&credentials.login, &credentials.password)?;
    Ok(Json(AuthResponse { token, user }))
}

pub async fn register(
    State(service): State<GophkeeperService>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<AuthResponse>, ServiceError> {
    let (token, user) = service.register(&credentials.login, &credentials.password)?;
    Ok(Json(AuthResponse { token, user }))
}
