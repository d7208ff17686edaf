//! Key lifecycle and signing oracle handlers.

use crate::error::{ApiError, ApiResult};
use crate::roots;
use crate::state::AppState;
use armory_core::roles::{RoleType, SignedPayload};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

/// `DELETE /root/{repo_id}/private_keys/{key_id}`: take a key offline.
pub async fn delete_private_key(
    State(state): State<AppState>,
    Path((repo_id, key_id)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    roots::delete_private_key(&state, repo_id, &key_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /root/{repo_id}/{role_type}`: sign a payload with the role's
/// online keys.
pub async fn sign_payload(
    State(state): State<AppState>,
    Path((repo_id, role_type)): Path<(Uuid, String)>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<SignedPayload<Value>>> {
    let role: RoleType = role_type
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("unknown role type '{role_type}'")))?;
    let signed = roots::sign_payload(&state, repo_id, role, payload).await?;
    Ok(Json(signed))
}

/// `GET /health`: liveness probe checking the database and the vault.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.metadata.health_check().await?;
    state.vault.health_check().await?;
    Ok(Json(json!({"status": "ok"})))
}
