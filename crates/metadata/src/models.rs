//! Database models mapping to the metadata schema.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A unit of key generation work.
#[derive(Debug, Clone, FromRow)]
pub struct KeyGenRequestRow {
    pub id: Uuid,
    pub repo_id: Uuid,
    pub role_type: String,
    pub key_type: String,
    pub key_size: i64,
    pub threshold: i64,
    pub status: String,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A public key record. The private half lives in the secret store under
/// `private_ref`; a NULL ref means the key has been taken offline.
#[derive(Debug, Clone, FromRow)]
pub struct KeyRow {
    pub key_id: String,
    pub repo_id: Uuid,
    pub role_type: String,
    pub key_type: String,
    /// TUF key document JSON.
    pub public_key: String,
    pub private_ref: Option<String>,
    pub created_at: OffsetDateTime,
}

/// One immutable version of a repo's signed root role.
///
/// `canonical_bytes` holds the canonical JSON of the signed portion;
/// `signatures` holds the signature array JSON. The two reassemble into the
/// served payload.
#[derive(Debug, Clone, FromRow)]
pub struct SignedRootRoleRow {
    pub repo_id: Uuid,
    pub version: i64,
    pub expires_at: OffsetDateTime,
    pub canonical_bytes: String,
    pub signatures: String,
    pub created_at: OffsetDateTime,
}

/// A target catalog entry.
#[derive(Debug, Clone, FromRow)]
pub struct TargetItemRow {
    pub repo_id: Uuid,
    pub filename: String,
    pub length: i64,
    pub checksum_method: String,
    pub checksum_hex: String,
    /// Custom metadata JSON (name, version, hardware IDs, proprietary, ...).
    pub custom_json: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// The current signed document for a non-root role.
///
/// `canonical_bytes` holds the canonical JSON of the full signed payload;
/// `checksum_hex` and `length` are computed over those bytes.
#[derive(Debug, Clone, FromRow)]
pub struct SignedRoleRow {
    pub repo_id: Uuid,
    pub role_type: String,
    pub version: i64,
    pub expires_at: OffsetDateTime,
    pub checksum_hex: String,
    pub length: i64,
    pub canonical_bytes: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// The current signed document for a delegated targets role.
#[derive(Debug, Clone, FromRow)]
pub struct DelegationRow {
    pub repo_id: Uuid,
    pub name: String,
    pub version: i64,
    pub canonical_bytes: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A repo registration, mapping an authenticated namespace to its repo.
#[derive(Debug, Clone, FromRow)]
pub struct RepoRow {
    pub repo_id: Uuid,
    pub namespace: String,
    pub key_type: String,
    pub created_at: OffsetDateTime,
}
