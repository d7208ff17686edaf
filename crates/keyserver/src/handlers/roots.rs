//! Root role handlers.

use crate::error::{ApiError, ApiResult};
use crate::roots;
use crate::state::AppState;
use armory_core::keys::KeyType;
use armory_core::roles::{RoleType, RootRole, SignedPayload};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Body of `POST /root/{repo_id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRootRequest {
    pub key_type: KeyType,
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default)]
    pub force_sync: bool,
}

fn default_threshold() -> u32 {
    1
}

/// Query parameters of `GET /root/{repo_id}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindRootParams {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_not_before: Option<OffsetDateTime>,
}

/// `POST /root/{repo_id}`: request a key hierarchy for a new repo.
pub async fn create_root(
    State(state): State<AppState>,
    Path(repo_id): Path<Uuid>,
    Json(request): Json<CreateRootRequest>,
) -> ApiResult<(StatusCode, Json<Vec<Uuid>>)> {
    let ids = roots::create_root(
        &state,
        repo_id,
        request.key_type,
        request.threshold,
        request.force_sync,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(ids)))
}

/// `GET /root/{repo_id}`: the current root, refreshed when stale.
pub async fn get_root(
    State(state): State<AppState>,
    Path(repo_id): Path<Uuid>,
    Query(params): Query<FindRootParams>,
) -> ApiResult<Json<SignedPayload<RootRole>>> {
    let payload = roots::find_fresh(&state, repo_id, params.expires_not_before).await?;
    Ok(Json(payload))
}

/// `GET /root/{repo_id}/{version}`: a historical root version.
pub async fn get_root_version(
    State(state): State<AppState>,
    Path((repo_id, version)): Path<(Uuid, String)>,
) -> ApiResult<Json<SignedPayload<RootRole>>> {
    let version: u64 = version
        .parse()
        .map_err(|_| ApiError::MissingEntity(format!("root role version '{version}'")))?;
    let payload = roots::find_version(&state, repo_id, version).await?;
    Ok(Json(payload))
}

/// `PUT /root/{repo_id}`: retry errored key generation requests.
pub async fn retry_key_generation(
    State(state): State<AppState>,
    Path(repo_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    roots::retry_key_generation(&state, repo_id).await?;
    Ok(StatusCode::OK)
}

/// `PUT /root/{repo_id}/rotate`: rotate the root key.
pub async fn rotate_root(
    State(state): State<AppState>,
    Path(repo_id): Path<Uuid>,
) -> ApiResult<Json<SignedPayload<RootRole>>> {
    let payload = roots::rotate(&state, repo_id).await?;
    Ok(Json(payload))
}

/// `GET /root/{repo_id}/unsigned`: the next root version for offline signing.
pub async fn get_unsigned_root(
    State(state): State<AppState>,
    Path(repo_id): Path<Uuid>,
) -> ApiResult<Json<RootRole>> {
    let root = roots::next_unsigned(&state, repo_id).await?;
    Ok(Json(root))
}

/// `POST /root/{repo_id}/unsigned`: store a client-signed root update.
pub async fn put_signed_root(
    State(state): State<AppState>,
    Path(repo_id): Path<Uuid>,
    Json(payload): Json<SignedPayload<RootRole>>,
) -> ApiResult<StatusCode> {
    roots::store_client_root(&state, repo_id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /root/{repo_id}/roles/offline-updates`: add the offline update role
/// slots.
pub async fn add_offline_updates_role(
    State(state): State<AppState>,
    Path(repo_id): Path<Uuid>,
) -> ApiResult<Json<SignedPayload<RootRole>>> {
    let payload = roots::add_roles(
        &state,
        repo_id,
        &[RoleType::OfflineUpdates, RoleType::OfflineSnapshot],
    )
    .await?;
    Ok(Json(payload))
}

/// `PUT /root/{repo_id}/roles/remote-sessions`: add the remote sessions role
/// slot.
pub async fn add_remote_sessions_role(
    State(state): State<AppState>,
    Path(repo_id): Path<Uuid>,
) -> ApiResult<Json<SignedPayload<RootRole>>> {
    let payload = roots::add_roles(&state, repo_id, &[RoleType::RemoteSessions]).await?;
    Ok(Json(payload))
}
