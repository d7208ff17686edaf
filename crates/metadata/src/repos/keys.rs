//! Public key repository trait.

use crate::error::MetadataResult;
use crate::models::KeyRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for public key records.
///
/// A key row is never physically deleted while it may still appear in a
/// persisted root role; taking a key offline only clears `private_ref`.
#[async_trait]
pub trait KeyRepo: Send + Sync {
    /// Insert a key. Key IDs are content-addressed and globally unique.
    async fn insert_key(&self, key: &KeyRow) -> MetadataResult<()>;

    /// Fetch a key scoped to its repo.
    async fn get_key(&self, repo_id: Uuid, key_id: &str) -> MetadataResult<Option<KeyRow>>;

    /// All keys assigned to a role within a repo, oldest first.
    async fn keys_for_role(&self, repo_id: Uuid, role_type: &str)
    -> MetadataResult<Vec<KeyRow>>;

    /// Null out the secret-store handle ("take offline"). Idempotent for
    /// already-offline keys; fails with `NotFound` for unknown keys.
    async fn clear_private_ref(&self, repo_id: Uuid, key_id: &str) -> MetadataResult<()>;

    /// Whether any key exists for the repo.
    async fn repo_has_keys(&self, repo_id: Uuid) -> MetadataResult<bool>;
}
