//! Target catalog handlers.

use super::common::{canonical_json_response, item_to_json};
use crate::error::{ApiError, ApiResult};
use crate::rolegen;
use crate::state::AppState;
use armory_core::roles::RoleType;
use armory_core::targets::{Checksum, TargetCustom, TargetFilename, TargetFormat};
use armory_metadata::models::TargetItemRow;
use armory_metadata::repos::TargetItemChange;
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Body of `POST /repo/{repo_id}/targets/{filename}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetItemRequest {
    pub length: u64,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub checksum: Option<Checksum>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub hardware_ids: Vec<String>,
    #[serde(default)]
    pub target_format: TargetFormat,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub proprietary_custom: Option<Value>,
}

/// `POST /repo/{repo_id}/targets/{filename}`: append or replace a catalog
/// entry and return the newly signed targets document.
pub async fn add_target(
    State(state): State<AppState>,
    Path((repo_id, filename)): Path<(Uuid, String)>,
    Json(request): Json<CreateTargetItemRequest>,
) -> ApiResult<Response> {
    let filename = TargetFilename::parse(filename)?;
    let checksum = match (request.checksum, request.sha256) {
        (Some(checksum), _) => checksum,
        (None, Some(hex)) => Checksum::sha256(hex)?,
        (None, None) => {
            return Err(ApiError::BadRequest(
                "either 'checksum' or 'sha256' is required".to_string(),
            ));
        }
    };
    if request.length == 0 {
        return Err(ApiError::BadRequest("length must be positive".to_string()));
    }

    rolegen::ensure_initialized(&state, repo_id).await?;

    let now = OffsetDateTime::now_utc();
    let existing = state
        .metadata
        .get_target_item(repo_id, filename.as_str())
        .await?;
    let existing_custom: Option<TargetCustom> = existing
        .as_ref()
        .and_then(|row| serde_json::from_str(&row.custom_json).ok());

    let custom = TargetCustom {
        name: request.name.unwrap_or_else(|| filename.to_string()),
        version: request.version.unwrap_or_default(),
        hardware_ids: request.hardware_ids,
        target_format: request.target_format,
        uri: request.uri,
        cli_uploaded: existing_custom.as_ref().and_then(|c| c.cli_uploaded),
        created_at: existing_custom.as_ref().map_or(now, |c| c.created_at),
        updated_at: now,
        proprietary: request
            .proprietary_custom
            .unwrap_or_else(|| existing_custom.map_or(Value::Null, |c| c.proprietary)),
    };

    let row = item_row(repo_id, &filename, request.length, &checksum, &custom, &existing, now)?;
    rolegen::regenerate(&state, repo_id, Some(TargetItemChange::Upsert(row))).await?;

    let targets = state
        .metadata
        .get_signed_role(repo_id, &RoleType::Targets.to_string())
        .await?
        .ok_or_else(|| ApiError::Internal("targets missing after regeneration".to_string()))?;
    canonical_json_response(targets.canonical_bytes.clone(), Some(&targets.checksum_hex))
}

/// Query parameters of `PUT /repo/{repo_id}/targets/{filename}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTargetParams {
    pub name: Option<String>,
    pub version: Option<String>,
    /// Comma-separated list.
    pub hardware_ids: Option<String>,
    pub target_format: Option<TargetFormat>,
    pub file_uri: Option<String>,
}

/// `PUT /repo/{repo_id}/targets/{filename}`: upload a target blob and
/// register it in the catalog.
pub async fn upload_target(
    State(state): State<AppState>,
    Path((repo_id, filename)): Path<(Uuid, String)>,
    Query(params): Query<UploadTargetParams>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let filename = TargetFilename::parse(filename)?;
    if body.len() as u64 > state.config.max_target_bytes {
        return Err(ApiError::PayloadTooLarge {
            max: state.config.max_target_bytes,
        });
    }
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty target upload".to_string()));
    }

    rolegen::ensure_initialized(&state, repo_id).await?;

    let length = body.len() as u64;
    let checksum = Checksum::sha256(hex::encode(Sha256::digest(&body)))?;
    state.storage.put(repo_id, &filename, body).await?;
    crate::metrics::TARGET_UPLOADS.inc();

    let now = OffsetDateTime::now_utc();
    let existing = state
        .metadata
        .get_target_item(repo_id, filename.as_str())
        .await?;
    let existing_custom: Option<TargetCustom> = existing
        .as_ref()
        .and_then(|row| serde_json::from_str(&row.custom_json).ok());

    let custom = TargetCustom {
        name: params.name.unwrap_or_else(|| filename.to_string()),
        version: params.version.unwrap_or_default(),
        hardware_ids: params
            .hardware_ids
            .map(|ids| {
                ids.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        target_format: params.target_format.unwrap_or_default(),
        uri: params.file_uri,
        cli_uploaded: Some(true),
        created_at: existing_custom.as_ref().map_or(now, |c| c.created_at),
        updated_at: now,
        proprietary: existing_custom.map_or(Value::Null, |c| c.proprietary),
    };

    let row = item_row(repo_id, &filename, length, &checksum, &custom, &existing, now)?;
    rolegen::regenerate(&state, repo_id, Some(TargetItemChange::Upsert(row))).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /repo/{repo_id}/targets/{filename}`: remove a catalog entry and
/// its blob. Fails with 412 when the targets role is offline.
pub async fn delete_target(
    State(state): State<AppState>,
    Path((repo_id, filename)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    let filename = TargetFilename::parse(filename)?;

    match rolegen::regenerate(
        &state,
        repo_id,
        Some(TargetItemChange::Delete(filename.to_string())),
    )
    .await
    {
        Ok(()) => {}
        Err(e) if rolegen::is_role_key_offline(&e) => {
            return Err(ApiError::PreconditionFailed(
                "targets role is offline; deletion requires online signing".to_string(),
            ));
        }
        Err(e) => return Err(e),
    }

    if let Err(e) = state.storage.delete(repo_id, &filename).await {
        tracing::warn!(repo_id = %repo_id, filename = %filename, error = %e, "failed to delete target blob");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /repo/{repo_id}/targets/{filename}`: serve a managed blob, redirect
/// to the configured URI for unmanaged targets.
pub async fn get_target_blob(
    State(state): State<AppState>,
    Path((repo_id, filename)): Path<(Uuid, String)>,
) -> ApiResult<Response> {
    let filename = TargetFilename::parse(filename)?;

    if state.storage.exists(repo_id, &filename).await? {
        let content = state.storage.get(repo_id, &filename).await?;
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(content))
            .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")));
    }

    let item = state
        .metadata
        .get_target_item(repo_id, filename.as_str())
        .await?
        .ok_or_else(|| ApiError::MissingEntity(format!("target {filename}")))?;
    let custom: TargetCustom = serde_json::from_str(&item.custom_json)
        .map_err(|e| ApiError::Internal(format!("stored custom metadata is corrupt: {e}")))?;

    match custom.uri {
        Some(uri) => Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, uri)
            .body(Body::empty())
            .map_err(|e| ApiError::Internal(format!("failed to build response: {e}"))),
        None => Err(ApiError::NoUriForUnmanagedTarget(filename.to_string())),
    }
}

/// `PATCH /repo/{repo_id}/proprietary-custom/{filename}`: shallow-merge the
/// proprietary custom object.
pub async fn patch_proprietary_custom(
    State(state): State<AppState>,
    Path((repo_id, filename)): Path<(Uuid, String)>,
    Json(patch): Json<Value>,
) -> ApiResult<Json<Value>> {
    let filename = TargetFilename::parse(filename)?;
    let item = state
        .metadata
        .get_target_item(repo_id, filename.as_str())
        .await?
        .ok_or_else(|| ApiError::MissingEntity(format!("target {filename}")))?;

    let mut custom: TargetCustom = serde_json::from_str(&item.custom_json)
        .map_err(|e| ApiError::Internal(format!("stored custom metadata is corrupt: {e}")))?;
    let now = OffsetDateTime::now_utc();
    custom.patch_proprietary(&patch, now);

    let row = TargetItemRow {
        repo_id,
        filename: item.filename.clone(),
        length: item.length,
        checksum_method: item.checksum_method.clone(),
        checksum_hex: item.checksum_hex.clone(),
        custom_json: serde_json::to_string(&custom)
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        created_at: item.created_at,
        updated_at: now,
    };
    rolegen::regenerate(&state, repo_id, Some(TargetItemChange::Upsert(row.clone()))).await?;

    item_to_json(&row).map(Json)
}

/// Body of `PATCH /repo/{repo_id}/targets/{filename}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditTargetItem {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub hardware_ids: Option<Vec<String>>,
    #[serde(default)]
    pub proprietary_custom: Option<Value>,
}

/// `PATCH /repo/{repo_id}/targets/{filename}`: edit mutable item fields.
pub async fn edit_target(
    State(state): State<AppState>,
    Path((repo_id, filename)): Path<(Uuid, String)>,
    Json(request): Json<EditTargetItem>,
) -> ApiResult<Json<Value>> {
    let filename = TargetFilename::parse(filename)?;
    let item = state
        .metadata
        .get_target_item(repo_id, filename.as_str())
        .await?
        .ok_or_else(|| ApiError::MissingEntity(format!("target {filename}")))?;

    let mut custom: TargetCustom = serde_json::from_str(&item.custom_json)
        .map_err(|e| ApiError::Internal(format!("stored custom metadata is corrupt: {e}")))?;
    let now = OffsetDateTime::now_utc();

    if let Some(uri) = request.uri {
        custom.uri = Some(uri);
    }
    if let Some(hardware_ids) = request.hardware_ids {
        custom.hardware_ids = hardware_ids;
    }
    if let Some(patch) = request.proprietary_custom {
        custom.patch_proprietary(&patch, now);
    }
    custom.updated_at = now;

    let row = TargetItemRow {
        repo_id,
        filename: item.filename.clone(),
        length: item.length,
        checksum_method: item.checksum_method.clone(),
        checksum_hex: item.checksum_hex.clone(),
        custom_json: serde_json::to_string(&custom)
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        created_at: item.created_at,
        updated_at: now,
    };
    rolegen::regenerate(&state, repo_id, Some(TargetItemChange::Upsert(row.clone()))).await?;

    item_to_json(&row).map(Json)
}

/// Query parameters of `GET /repo/{repo_id}/target_items`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTargetItemsParams {
    pub name_contains: Option<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

/// One page of results.
#[derive(Debug, Serialize)]
pub struct PaginationResult {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub values: Vec<Value>,
}

/// `GET /repo/{repo_id}/target_items`: stable-ordered catalog page.
pub async fn list_target_items(
    State(state): State<AppState>,
    Path(repo_id): Path<Uuid>,
    Query(params): Query<ListTargetItemsParams>,
) -> ApiResult<Json<PaginationResult>> {
    let offset = params.offset.unwrap_or(0);
    let limit = params
        .limit
        .unwrap_or(state.config.pagination.default_limit)
        .min(state.config.pagination.max_limit);

    let page = state
        .metadata
        .page_target_items(repo_id, params.name_contains.as_deref(), offset, limit)
        .await?;

    let values = page
        .values
        .iter()
        .map(item_to_json)
        .collect::<ApiResult<Vec<Value>>>()?;

    Ok(Json(PaginationResult {
        total: page.total,
        offset,
        limit,
        values,
    }))
}

#[allow(clippy::too_many_arguments)]
fn item_row(
    repo_id: Uuid,
    filename: &TargetFilename,
    length: u64,
    checksum: &Checksum,
    custom: &TargetCustom,
    existing: &Option<TargetItemRow>,
    now: OffsetDateTime,
) -> ApiResult<TargetItemRow> {
    Ok(TargetItemRow {
        repo_id,
        filename: filename.to_string(),
        length: length as i64,
        checksum_method: checksum.method.to_string(),
        checksum_hex: checksum.hash.clone(),
        custom_json: serde_json::to_string(custom).map_err(|e| ApiError::Internal(e.to_string()))?,
        created_at: existing.as_ref().map_or(now, |row| row.created_at),
        updated_at: now,
    })
}
