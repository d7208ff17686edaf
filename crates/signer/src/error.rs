//! Signer error types.

use thiserror::Error;

/// Errors from key generation, parsing, signing, and verification.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("rsa key size {bits} below minimum of {min} bits")]
    KeySizeTooSmall { bits: u32, min: u32 },

    #[error("key parsing failed: {0}")]
    KeyParsing(String),

    #[error("key encoding failed: {0}")]
    KeyEncoding(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("signature verification failed")]
    VerificationFailed,
}

/// Result type for signer operations.
pub type SignerResult<T> = std::result::Result<T, SignerError>;
