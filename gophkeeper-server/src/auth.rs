//! Token auth middleware for the authenticated route set.

use crate::error::ServiceError;
use crate::service::GophkeeperService;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

/// The authenticated user id, attached to request extensions by the
/// middleware and read back by handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

/// Reads the bearer token from the `authorization` header, verifies it and
/// binds the user id to the request. Absent or invalid tokens fail with 401
/// before the handler runs.
pub async fn auth_middleware(
    State(service): State<GophkeeperService>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ServiceError> {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(ServiceError::TokenMissing)?;

    let user_id = service.token_manager().parse(token)?;

    request.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(request).await)
}

/// Extract the bound user id inside a handler. The middleware guarantees its
/// presence on authenticated routes; absence is an internal wiring error.
pub fn user_id(extensions: &axum::http::Extensions) -> Result<i64, ServiceError> {
    extensions
        .get::<AuthUser>()
        .map(|u| u.0)
        .ok_or_else(|| ServiceError::Internal("request context carries no user id".to_string()))
}
