//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("json serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid target filename: {0}")]
    InvalidTargetFilename(String),

    #[error("invalid role type: {0}")]
    InvalidRoleType(String),

    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
