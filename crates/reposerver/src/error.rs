//! API error types.

use crate::keyclient::KeyClientError;
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
    /// Structured detail when available.
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

    #[error("invalid version bump: expected {expected}, got {got}")]
    InvalidVersionBump { expected: u64, got: u64 },

    #[error("payload signature invalid: {0}")]
    PayloadSignatureInvalid(String),

    #[error("delegation not defined: {0}")]
    DelegationNotDefined(String),

    #[error("precondition required: {0}")]
    PreconditionRequired(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("payload exceeds maximum of {max} bytes")]
    PayloadTooLarge { max: u64 },

    #[error("unmanaged target has no uri: {0}")]
    NoUriForUnmanagedTarget(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("metadata error: {0}")]
    Metadata(#[from] armory_metadata::MetadataError),

    #[error("storage error: {0}")]
    Storage(#[from] armory_storage::StorageError),

    #[error("core error: {0}")]
    Core(#[from] armory_core::Error),

    #[error("key server error: {0}")]
    KeyClient(#[from] KeyClientError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingEntity(_) => "missing_entity",
            Self::EntityAlreadyExists(_) => "entity_already_exists",
            Self::KeysNotReady(_) => "keys_not_ready",
            Self::RoleKeyNotFound(_) => "role_key_not_found",
            Self::InvalidVersionBump { .. } => "invalid_version_bump",
            Self::PayloadSignatureInvalid(_) => "payload_signature_invalid",
            Self::DelegationNotDefined(_) => "delegation_not_defined",
            Self::PreconditionRequired(_) => "precondition_required",
            Self::PreconditionFailed(_) => "precondition_failed",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::NoUriForUnmanagedTarget(_) => "no_uri_for_unmanaged_target",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
            Self::Metadata(e) => match e {
                armory_metadata::MetadataError::NotFound(_) => "missing_entity",
                armory_metadata::MetadataError::AlreadyExists(_) => "entity_already_exists",
                armory_metadata::MetadataError::VersionConflict { .. } => "invalid_version_bump",
                _ => "metadata_error",
            },
            Self::Storage(e) => match e {
                armory_storage::StorageError::NotFound(_) => "missing_entity",
                _ => "storage_error",
            },
            Self::Core(_) => "bad_request",
            Self::KeyClient(e) => match e {
                KeyClientError::KeysNotReady(_) => "keys_not_ready",
                KeyClientError::RoleKeyNotFound(_) => "role_key_not_found",
                KeyClientError::NotFound(_) => "missing_entity",
                KeyClientError::Conflict(_) => "entity_already_exists",
                _ => "key_server_error",
            },
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingEntity(_) => StatusCode::NOT_FOUND,
            Self::EntityAlreadyExists(_) => StatusCode::CONFLICT,
            Self::KeysNotReady(_) => StatusCode::FAILED_DEPENDENCY,
            Self::RoleKeyNotFound(_) => StatusCode::PRECONDITION_FAILED,
            Self::InvalidVersionBump { .. } => StatusCode::CONFLICT,
            Self::PayloadSignatureInvalid(_) => StatusCode::BAD_REQUEST,
            Self::DelegationNotDefined(_) => StatusCode::BAD_REQUEST,
            Self::PreconditionRequired(_) => StatusCode::PRECONDITION_REQUIRED,
            Self::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NoUriForUnmanagedTarget(_) => StatusCode::PRECONDITION_FAILED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Metadata(e) => match e {
                armory_metadata::MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                armory_metadata::MetadataError::AlreadyExists(_) => StatusCode::CONFLICT,
                armory_metadata::MetadataError::VersionConflict { .. } => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Storage(e) => match e {
                armory_storage::StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(_) => StatusCode::BAD_REQUEST,
            Self::KeyClient(e) => match e {
                KeyClientError::KeysNotReady(_) => StatusCode::FAILED_DEPENDENCY,
                KeyClientError::RoleKeyNotFound(_) => StatusCode::PRECONDITION_FAILED,
                KeyClientError::NotFound(_) => StatusCode::NOT_FOUND,
                KeyClientError::Conflict(_) => StatusCode::CONFLICT,
                _ => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            description: self.to_string(),
            cause: None,
            error_id: uuid::Uuid::new_v4(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
