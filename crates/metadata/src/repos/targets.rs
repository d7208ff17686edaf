//! Target catalog repository trait (read side).
//!
//! Catalog writes go through `SignedRoleRepo::persist_signed_roles` so that
//! an item change and the role documents derived from it commit atomically.

use crate::error::MetadataResult;
use crate::models::TargetItemRow;
use async_trait::async_trait;
use uuid::Uuid;

/// One page of catalog entries.
#[derive(Debug, Clone)]
pub struct TargetItemPage {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub values: Vec<TargetItemRow>,
}

/// Repository for target catalog entries.
#[async_trait]
pub trait TargetItemRepo: Send + Sync {
    /// Fetch a single entry.
    async fn get_target_item(
        &self,
        repo_id: Uuid,
        filename: &str,
    ) -> MetadataResult<Option<TargetItemRow>>;

    /// All entries for a repo, ordered by filename.
    async fn list_target_items(&self, repo_id: Uuid) -> MetadataResult<Vec<TargetItemRow>>;

    /// A stable-ordered page of entries, optionally filtered by a substring
    /// of the filename.
    async fn page_target_items(
        &self,
        repo_id: Uuid,
        name_contains: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> MetadataResult<TargetItemPage>;
}
