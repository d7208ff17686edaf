//! Repo lifecycle and role document handlers.

use super::common::canonical_json_response;
use crate::error::{ApiError, ApiResult};
use crate::keyclient::KeyClientError;
use crate::rolegen;
use crate::state::AppState;
use armory_core::NAMESPACE_HEADER;
use armory_core::canonical;
use armory_core::keys::KeyType;
use armory_core::roles::RoleType;
use armory_metadata::models::RepoRow;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

/// Body of `POST /user_repo`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRepositoryRequest {
    pub key_type: KeyType,
}

/// `POST /user_repo`: create the repo for the request's namespace.
pub async fn create_repo(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateRepositoryRequest>,
) -> ApiResult<(StatusCode, Json<Uuid>)> {
    let namespace = headers
        .get(NAMESPACE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest(format!("{NAMESPACE_HEADER} header is required")))?;

    if state.metadata.get_repo_by_namespace(namespace).await?.is_some() {
        return Err(ApiError::EntityAlreadyExists(format!(
            "namespace '{namespace}'"
        )));
    }

    let repo_id = Uuid::new_v4();
    state
        .metadata
        .create_repo(&RepoRow {
            repo_id,
            namespace: namespace.to_string(),
            key_type: request.key_type.to_string(),
            created_at: OffsetDateTime::now_utc(),
        })
        .await?;

    state.keys.create_root(repo_id, request.key_type).await?;
    tracing::info!(repo_id = %repo_id, namespace, "repository created");

    // Generate the initial empty role set when keys are already available;
    // otherwise the first successful read does it.
    match rolegen::ensure_initialized(&state, repo_id).await {
        Ok(())
        | Err(ApiError::KeysNotReady(_))
        | Err(ApiError::KeyClient(KeyClientError::KeysNotReady(_))) => {}
        Err(e) => return Err(e),
    }

    Ok((StatusCode::CREATED, Json(repo_id)))
}

/// `GET /repo/{repo_id}/{role_file}`: serve a role document.
///
/// Accepts `root.json`, `{n}.root.json`, `targets.json`, `snapshot.json`,
/// and `timestamp.json`. `targets.json` carries the role checksum header for
/// offline signing flows.
pub async fn get_role_file(
    State(state): State<AppState>,
    Path((repo_id, role_file)): Path<(Uuid, String)>,
) -> ApiResult<Response> {
    match role_file.as_str() {
        "root.json" => {
            let floor = state.metadata.get_expires_not_before(repo_id).await?;
            let payload = state.keys.fetch_root(repo_id, floor).await?;
            let bytes = String::from_utf8(canonical::to_canonical_json(&payload)?)
                .map_err(|e| ApiError::Internal(format!("canonical bytes are not utf-8: {e}")))?;
            canonical_json_response(bytes, None)
        }
        "targets.json" => {
            let row = rolegen::find_role(&state, repo_id, RoleType::Targets).await?;
            canonical_json_response(row.canonical_bytes.clone(), Some(&row.checksum_hex))
        }
        "snapshot.json" => {
            let row = rolegen::find_role(&state, repo_id, RoleType::Snapshot).await?;
            canonical_json_response(row.canonical_bytes, None)
        }
        "timestamp.json" => {
            let row = rolegen::find_role(&state, repo_id, RoleType::Timestamp).await?;
            canonical_json_response(row.canonical_bytes, None)
        }
        other => {
            let version = other
                .strip_suffix(".root.json")
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or_else(|| ApiError::MissingEntity(format!("role file '{other}'")))?;
            let payload = state.keys.fetch_root_version(repo_id, version).await?;
            let bytes = String::from_utf8(canonical::to_canonical_json(&payload)?)
                .map_err(|e| ApiError::Internal(format!("canonical bytes are not utf-8: {e}")))?;
            canonical_json_response(bytes, None)
        }
    }
}

/// Body of `PUT /repo/{repo_id}/targets/expire/not-before`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpireNotBeforeRequest {
    #[serde(with = "time::serde::rfc3339")]
    pub expire_at: OffsetDateTime,
}

/// `PUT /repo/{repo_id}/targets/expire/not-before`: set the instant before
/// which no role for this repo may expire, and re-issue the roles under it.
pub async fn set_expire_not_before(
    State(state): State<AppState>,
    Path(repo_id): Path<Uuid>,
    Json(request): Json<ExpireNotBeforeRequest>,
) -> ApiResult<StatusCode> {
    state
        .metadata
        .set_expires_not_before(repo_id, request.expire_at, OffsetDateTime::now_utc())
        .await?;

    // Re-issue immediately when signing is possible; an offline repo picks
    // the floor up on its next refresh.
    match rolegen::regenerate(&state, repo_id, None).await {
        Ok(()) => {}
        Err(e)
            if rolegen::is_role_key_offline(&e)
                || matches!(
                    e,
                    ApiError::KeysNotReady(_)
                        | ApiError::KeyClient(KeyClientError::KeysNotReady(_))
                ) => {}
        Err(e) => return Err(e),
    }

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /health`: liveness probe checking the database and blob storage.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.metadata.health_check().await?;
    state.storage.health_check().await?;
    Ok(Json(json!({"status": "ok"})))
}
