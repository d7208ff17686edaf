//! Repo registration repository trait.

use crate::error::MetadataResult;
use crate::models::RepoRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for repo registrations and per-repo expiry floors.
#[async_trait]
pub trait RepoRepo: Send + Sync {
    /// Register a repo. Fails with `AlreadyExists` when the namespace is
    /// already mapped.
    async fn create_repo(&self, repo: &RepoRow) -> MetadataResult<()>;

    /// Fetch a registration by repo ID.
    async fn get_repo(&self, repo_id: Uuid) -> MetadataResult<Option<RepoRow>>;

    /// Fetch a registration by namespace.
    async fn get_repo_by_namespace(&self, namespace: &str) -> MetadataResult<Option<RepoRow>>;

    /// Set the instant before which no role for this repo may expire.
    async fn set_expires_not_before(
        &self,
        repo_id: Uuid,
        not_before: OffsetDateTime,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// The configured expiry floor, if any.
    async fn get_expires_not_before(
        &self,
        repo_id: Uuid,
    ) -> MetadataResult<Option<OffsetDateTime>>;
}
