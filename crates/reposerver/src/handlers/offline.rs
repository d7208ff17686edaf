//! Offline-signed targets and delegation handlers.

use super::common::canonical_json_response;
use crate::error::{ApiError, ApiResult};
use crate::offline;
use crate::state::AppState;
use armory_core::ROLE_CHECKSUM_HEADER;
use armory_core::roles::{SignedPayload, TargetsRole};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use uuid::Uuid;

/// `PUT /repo/{repo_id}/targets`: accept a client-signed targets document.
pub async fn put_offline_targets(
    State(state): State<AppState>,
    Path(repo_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<SignedPayload<TargetsRole>>,
) -> ApiResult<StatusCode> {
    let checksum = headers
        .get(ROLE_CHECKSUM_HEADER)
        .and_then(|v| v.to_str().ok());
    offline::store_offline_targets(&state, repo_id, payload, checksum).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /repo/{repo_id}/delegations/{name}.json`: accept a delegated
/// targets document.
pub async fn put_delegation(
    State(state): State<AppState>,
    Path((repo_id, name)): Path<(Uuid, String)>,
    Json(payload): Json<SignedPayload<TargetsRole>>,
) -> ApiResult<StatusCode> {
    let name = delegation_name(&name)?;
    offline::store_delegated_targets(&state, repo_id, name, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /repo/{repo_id}/delegations/{name}.json`: serve a stored delegated
/// targets document.
pub async fn get_delegation(
    State(state): State<AppState>,
    Path((repo_id, name)): Path<(Uuid, String)>,
) -> ApiResult<Response> {
    let name = delegation_name(&name)?;
    let row = state
        .metadata
        .get_delegation(repo_id, name)
        .await?
        .ok_or_else(|| ApiError::MissingEntity(format!("delegation {name}")))?;
    canonical_json_response(row.canonical_bytes, None)
}

fn delegation_name(raw: &str) -> ApiResult<&str> {
    let name = raw
        .strip_suffix(".json")
        .ok_or_else(|| ApiError::BadRequest("delegation path must end in .json".to_string()))?;
    if name.is_empty() {
        return Err(ApiError::BadRequest("delegation name is empty".to_string()));
    }
    Ok(name)
}
