//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub description: String,
    /// Structured detail, e.g. the per-check cause list of a rejected root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Value>,
    /// Correlation ID for this failure.
    #[serde(rename = "errorId")]
    pub error_id: uuid::Uuid,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing entity: {0}")]
    MissingEntity(String),

    #[error("already exists: {0}")]
    EntityAlreadyExists(String),

    #[error("keys not ready: {0}")]
    KeysNotReady(String),

    #[error("no usable key for role: {0}")]
    RoleKeyNotFound(String),

    #[error("invalid root role ({} checks failed)", .0.len())]
    InvalidRootRole(Vec<String>),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("metadata error: {0}")]
    Metadata(#[from] armory_metadata::MetadataError),

    #[error("vault error: {0}")]
    Vault(#[from] armory_vault::VaultError),

    #[error("signer error: {0}")]
    Signer(#[from] armory_signer::SignerError),

    #[error("core error: {0}")]
    Core(#[from] armory_core::Error),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingEntity(_) => "missing_entity",
            Self::EntityAlreadyExists(_) => "entity_already_exists",
            Self::KeysNotReady(_) => "keys_not_ready",
            Self::RoleKeyNotFound(_) => "role_key_not_found",
            Self::InvalidRootRole(_) => "invalid_root_role",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
            Self::Metadata(e) => match e {
                armory_metadata::MetadataError::NotFound(_) => "missing_entity",
                armory_metadata::MetadataError::AlreadyExists(_) => "entity_already_exists",
                armory_metadata::MetadataError::VersionConflict { .. } => "invalid_version_bump",
                _ => "metadata_error",
            },
            Self::Vault(_) => "vault_error",
            Self::Signer(_) => "signer_error",
            Self::Core(_) => "bad_request",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingEntity(_) => StatusCode::NOT_FOUND,
            Self::EntityAlreadyExists(_) => StatusCode::CONFLICT,
            Self::KeysNotReady(_) => StatusCode::FAILED_DEPENDENCY,
            Self::RoleKeyNotFound(_) => StatusCode::PRECONDITION_FAILED,
            Self::InvalidRootRole(_) => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Metadata(e) => match e {
                armory_metadata::MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                armory_metadata::MetadataError::AlreadyExists(_) => StatusCode::CONFLICT,
                armory_metadata::MetadataError::VersionConflict { .. } => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Vault(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Signer(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Core(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn cause(&self) -> Option<Value> {
        match self {
            Self::InvalidRootRole(causes) => Some(Value::Array(
                causes.iter().map(|c| Value::String(c.clone())).collect(),
            )),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            description: self.to_string(),
            cause: self.cause(),
            error_id: uuid::Uuid::new_v4(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
