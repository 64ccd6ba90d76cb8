//! Axum router setup.

use crate::auth::auth_middleware;
use crate::handlers::{auth, secrets};
use crate::service::GophkeeperService;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn build_router(service: GophkeeperService) -> Router {
    let authenticated = Router::new()
        .route("/api/v1/secrets/sync-meta", get(secrets::sync_meta))
        .route(
            "/api/v1/secrets/sync-meta/{name}",
            get(secrets::sync_meta_by_name),
        )
        .route(
            "/api/v1/secrets/{id}",
            get(secrets::get_secret).delete(secrets::delete_secret),
        )
        .route("/api/v1/secrets", put(secrets::save_secret))
        .layer(middleware::from_fn_with_state(
            service.clone(),
            auth_middleware,
        ));

    let public = Router::new()
        .route("/api/v1/login", post(auth::login))
        .route("/api/v1/register", post(auth::register))
        .route("/health", get(health));

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn health() -> &'static str {
    "ok"
}
