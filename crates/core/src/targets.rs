//! Target catalog domain types.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use time::OffsetDateTime;

/// Upper bound on target path length.
pub const MAX_FILENAME_LENGTH: usize = 254;

/// A validated target path.
///
/// Paths are relative (no leading `/`), contain no `..` segments, and are
/// bounded in length.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetFilename(String);

impl TargetFilename {
    pub fn parse(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s.is_empty() {
            return Err(Error::InvalidTargetFilename("must not be empty".to_string()));
        }
        if s.len() > MAX_FILENAME_LENGTH {
            return Err(Error::InvalidTargetFilename(format!(
                "length {} exceeds maximum {MAX_FILENAME_LENGTH}",
                s.len()
            )));
        }
        if s.starts_with('/') {
            return Err(Error::InvalidTargetFilename(
                "must not start with '/'".to_string(),
            ));
        }
        if s.split('/').any(|segment| segment == "..") {
            return Err(Error::InvalidTargetFilename(
                "must not contain '..' segments".to_string(),
            ));
        }
        if s.contains('\0') {
            return Err(Error::InvalidTargetFilename(
                "must not contain NUL bytes".to_string(),
            ));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TargetFilename {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<TargetFilename> for String {
    fn from(f: TargetFilename) -> String {
        f.0
    }
}

impl fmt::Display for TargetFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checksum method for target content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksumMethod {
    #[serde(rename = "sha256")]
    Sha256,
}

serde_plain::forward_display_to_serde!(ChecksumMethod);
serde_plain::forward_from_str_to_serde!(ChecksumMethod);

/// A content checksum: method plus lowercase hex digest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub method: ChecksumMethod,
    pub hash: String,
}

impl Checksum {
    /// Build a SHA-256 checksum from a hex digest, validating shape.
    pub fn sha256(hash: impl Into<String>) -> Result<Self> {
        let hash = hash.into();
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidChecksum(format!(
                "expected 64 hex characters, got '{hash}'"
            )));
        }
        Ok(Self {
            method: ChecksumMethod::Sha256,
            hash: hash.to_ascii_lowercase(),
        })
    }
}

/// Binary layout of a target blob.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetFormat {
    #[default]
    Binary,
    Ostree,
}

serde_plain::forward_display_to_serde!(TargetFormat);
serde_plain::forward_from_str_to_serde!(TargetFormat);

/// Custom metadata attached to a catalog entry.
///
/// The `proprietary` object is free-form and owned by the tenant; everything
/// else is managed by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCustom {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub hardware_ids: Vec<String>,
    #[serde(default)]
    pub target_format: TargetFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_uploaded: Option<bool>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub proprietary: Value,
}

impl TargetCustom {
    /// Shallow-merge a patch into the proprietary object: top-level keys in
    /// the patch overwrite, everything else is preserved. Non-proprietary
    /// fields are never touched.
    pub fn patch_proprietary(&mut self, patch: &Value, now: OffsetDateTime) {
        let merged = match (&self.proprietary, patch) {
            (Value::Object(current), Value::Object(incoming)) => {
                let mut merged = current.clone();
                for (k, v) in incoming {
                    merged.insert(k.clone(), v.clone());
                }
                Value::Object(merged)
            }
            (_, incoming) => incoming.clone(),
        };
        self.proprietary = merged;
        self.updated_at = now;
    }
}

/// A target catalog entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetItem {
    pub filename: TargetFilename,
    pub length: u64,
    pub checksum: Checksum,
    pub custom: TargetCustom,
}
