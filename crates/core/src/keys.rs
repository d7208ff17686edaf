//! TUF key documents, key identifiers, and signature schemes.

use crate::canonical;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported key algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    #[serde(rename = "ed25519")]
    Ed25519,
    #[serde(rename = "ecdsa-sha2-nistp256")]
    EcPrime256,
    #[serde(rename = "rsa")]
    Rsa,
}

serde_plain::forward_display_to_serde!(KeyType);
serde_plain::forward_from_str_to_serde!(KeyType);

impl KeyType {
    /// The signature scheme this key type signs with.
    pub fn signature_method(&self) -> SignatureMethod {
        match self {
            KeyType::Ed25519 => SignatureMethod::Ed25519,
            KeyType::EcPrime256 => SignatureMethod::EcdsaSha2Nistp256,
            KeyType::Rsa => SignatureMethod::RsassaPssSha256,
        }
    }

    /// Default key size in bits.
    pub fn default_key_size(&self) -> u32 {
        match self {
            KeyType::Ed25519 | KeyType::EcPrime256 => 256,
            KeyType::Rsa => 2048,
        }
    }
}

/// Signature scheme identifiers as they appear on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureMethod {
    #[serde(rename = "ed25519")]
    Ed25519,
    #[serde(rename = "ecdsa-sha2-nistp256")]
    EcdsaSha2Nistp256,
    #[serde(rename = "rsassa-pss-sha256")]
    RsassaPssSha256,
}

serde_plain::forward_display_to_serde!(SignatureMethod);

/// Content-addressed key identifier: lowercase hex SHA-256 of the canonical
/// JSON encoding of the public key document.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for KeyId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for KeyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public key material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyVal {
    pub public: String,
}

/// A public key document as embedded in role metadata.
///
/// Ed25519 public keys are hex-encoded raw bytes; EC-P256 and RSA keys are
/// SPKI PEM.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TufKey {
    pub keytype: KeyType,
    pub keyval: KeyVal,
    pub scheme: SignatureMethod,
}

impl TufKey {
    /// Build a key document with the scheme implied by the key type.
    pub fn new(keytype: KeyType, public: String) -> Self {
        Self {
            keytype,
            keyval: KeyVal { public },
            scheme: keytype.signature_method(),
        }
    }

    /// Compute the content-addressed key ID of this document.
    pub fn key_id(&self) -> Result<KeyId> {
        Ok(KeyId(canonical::sha256_hex(self)?))
    }
}
