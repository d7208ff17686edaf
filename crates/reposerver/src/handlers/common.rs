//! Shared handler helpers.

use crate::error::{ApiError, ApiResult};
use armory_metadata::models::TargetItemRow;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};

/// Serve stored canonical JSON bytes verbatim, optionally with the role
/// checksum header.
pub fn canonical_json_response(bytes: String, checksum: Option<&str>) -> ApiResult<Response> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(checksum) = checksum {
        builder = builder.header(armory_core::ROLE_CHECKSUM_HEADER, checksum);
    }
    builder
        .body(Body::from(bytes))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}

/// API representation of a catalog entry.
pub fn item_to_json(row: &TargetItemRow) -> ApiResult<Value> {
    let custom: Value = serde_json::from_str(&row.custom_json)
        .map_err(|e| ApiError::Internal(format!("stored custom metadata is corrupt: {e}")))?;
    Ok(json!({
        "filename": row.filename,
        "length": row.length,
        "checksum": {"method": row.checksum_method, "hash": row.checksum_hex},
        "custom": custom,
    }))
}
