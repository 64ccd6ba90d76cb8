//! Secret CRUD and sync-metadata handlers (authenticated).

use crate::auth::user_id;
use crate::error::ServiceError;
use crate::service::GophkeeperService;
use axum::extract::{Path, State};
use axum::http::Extensions;
use axum::Json;
use gophkeeper_core::{EncodedSecret, SecretSyncMeta};
use uuid::Uuid;

pub async fn sync_meta(
    State(service): State<GophkeeperService>,
    extensions: Extensions,
) -> Result<Json<Vec<SecretSyncMeta>>, ServiceError> {
    let user = user_id(&extensions)?;
    Ok(Json(service.sync_meta_by_user(user)?))
}

pub async fn sync_meta_by_name(
    State(service): State<GophkeeperService>,
    extensions: Extensions,
    Path(name): Path<String>,
) -> Result<Json<SecretSyncMeta>, ServiceError> {
    let user = user_id(&extensions)?;
    Ok(Json(service.sync_meta_by_name(user, &name)?))
}

pub async fn get_secret(
    State(service): State<GophkeeperService>,
    extensions: Extensions,
    Path(id): Path<Uuid>,
) -> Result<Json<EncodedSecret>, ServiceError> {
    let user = user_id(&extensions)?;
    Ok(Json(service.get_secret(user, &id)?))
}

pub async fn save_secret(
    State(service): State<GophkeeperService>,
    extensions: Extensions,
    Json(secret): Json<EncodedSecret>,
) -> Result<(), ServiceError> {
    let user = user_id(&extensions)?;
    service.save_encoded_secret(user, &secret)
}

pub async fn delete_secret(
    State(service): State<GophkeeperService>,
    extensions: Extensions,
    Path(id): Path<Uuid>,
) -> Result<(), ServiceError> {
    let user = user_id(&extensions)?;
    service.delete_secret(user, &id)
}
