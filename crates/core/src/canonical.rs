//! Canonical JSON serialization.
//!
//! Every signature in the system is computed over canonical bytes, and every
//! role hash is SHA-256 of canonical bytes: keys lexicographically sorted, no
//! insignificant whitespace, UTF-8, no duplicate keys. This module is the
//! single entry point for producing those bytes.

use crate::error::Result;
use olpc_cjson::CanonicalFormatter;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serialize a value to canonical JSON bytes.
pub fn to_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut bytes, CanonicalFormatter::new());
    value.serialize(&mut ser)?;
    Ok(bytes)
}

/// Lowercase hex SHA-256 over the canonical encoding of a value.
pub fn sha256_hex<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(sha256_hex_bytes(&to_canonical_json(value)?))
}

/// Lowercase hex SHA-256 over raw bytes.
pub fn sha256_hex_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
