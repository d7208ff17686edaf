//! Delegated targets repository trait.

use crate::error::MetadataResult;
use crate::models::DelegationRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for pushed delegated targets documents.
#[async_trait]
pub trait DelegationRepo: Send + Sync {
    /// Fetch the current document for a named delegation.
    async fn get_delegation(
        &self,
        repo_id: Uuid,
        name: &str,
    ) -> MetadataResult<Option<DelegationRow>>;

    /// Insert or replace a delegation document. The version must be strictly
    /// greater than any stored version for the name.
    async fn upsert_delegation(&self, row: &DelegationRow) -> MetadataResult<()>;
}
