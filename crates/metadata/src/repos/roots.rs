//! Signed root role repository trait.

use crate::error::MetadataResult;
use crate::models::SignedRootRoleRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for immutable signed root role versions.
#[async_trait]
pub trait RootRoleRepo: Send + Sync {
    /// Append the next root version. Versions per repo are dense starting at
    /// 1; inserting anything other than `max + 1` fails with
    /// `VersionConflict`.
    async fn insert_root_role(&self, row: &SignedRootRoleRow) -> MetadataResult<()>;

    /// The highest persisted root version, if any.
    async fn latest_root_role(&self, repo_id: Uuid)
    -> MetadataResult<Option<SignedRootRoleRow>>;

    /// A specific historical root version.
    async fn get_root_role(
        &self,
        repo_id: Uuid,
        version: i64,
    ) -> MetadataResult<Option<SignedRootRoleRow>>;
}
