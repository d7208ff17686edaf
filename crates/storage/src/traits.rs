//! Blob store trait definitions.

use crate::error::StorageResult;
use armory_core::targets::TargetFilename;
use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

/// Blob store for target content, keyed by `(repo_id, filename)`.
#[async_trait]
pub trait TargetStore: Send + Sync + 'static {
    /// Check whether a target blob exists.
    async fn exists(&self, repo_id: Uuid, filename: &TargetFilename) -> StorageResult<bool>;

    /// Store a target blob, replacing any previous content.
    async fn put(
        &self,
        repo_id: Uuid,
        filename: &TargetFilename,
        content: Bytes,
    ) -> StorageResult<()>;

    /// Fetch a target blob.
    async fn get(&self, repo_id: Uuid, filename: &TargetFilename) -> StorageResult<Bytes>;

    /// Delete a target blob. Succeeds when the blob is already absent.
    async fn delete(&self, repo_id: Uuid, filename: &TargetFilename) -> StorageResult<()>;

    /// Verify the backend is reachable.
    async fn health_check(&self) -> StorageResult<()>;
}
