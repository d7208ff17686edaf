//! Vault error types.

use thiserror::Error;

/// Secret store operation errors.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("invalid secret handle: {0}")]
    InvalidHandle(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for vault operations.
pub type VaultResult<T> = std::result::Result<T, VaultError>;
