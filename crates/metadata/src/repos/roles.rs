//! Signed role document repository trait.

use crate::error::MetadataResult;
use crate::models::{SignedRoleRow, TargetItemRow};
use async_trait::async_trait;
use uuid::Uuid;

/// A catalog mutation applied atomically with a role cascade.
#[derive(Debug, Clone)]
pub enum TargetItemChange {
    /// Insert or replace an entry by `(repo_id, filename)`, preserving the
    /// stored `created_at` on replacement.
    Upsert(TargetItemRow),
    /// Remove an entry. Fails with `NotFound` when absent.
    Delete(String),
}

/// Repository for the current signed document of each non-root role.
#[async_trait]
pub trait SignedRoleRepo: Send + Sync {
    /// Fetch the current document for a role.
    async fn get_signed_role(
        &self,
        repo_id: Uuid,
        role_type: &str,
    ) -> MetadataResult<Option<SignedRoleRow>>;

    /// Persist role documents, and optionally a catalog change, in a single
    /// transaction.
    ///
    /// For every row the new version must be exactly `current + 1` (1 when
    /// the role has no current row); otherwise nothing is written and the
    /// call fails with `VersionConflict`.
    async fn persist_signed_roles(
        &self,
        repo_id: Uuid,
        change: Option<TargetItemChange>,
        roles: &[SignedRoleRow],
    ) -> MetadataResult<()>;
}
