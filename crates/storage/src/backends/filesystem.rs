//! Local filesystem blob storage.

use crate::error::{StorageError, StorageResult};
use crate::traits::TargetStore;
use armory_core::targets::TargetFilename;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Stores target blobs as `{root}/{repo_id}/{filename}`.
///
/// `TargetFilename` validation already rules out absolute paths and `..`
/// segments, so joining it under the repo directory is safe.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a backend rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn blob_path(&self, repo_id: Uuid, filename: &TargetFilename) -> PathBuf {
        self.root.join(repo_id.to_string()).join(filename.as_str())
    }
}

#[async_trait]
impl TargetStore for FilesystemBackend {
    async fn exists(&self, repo_id: Uuid, filename: &TargetFilename) -> StorageResult<bool> {
        match tokio::fs::metadata(self.blob_path(repo_id, filename)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(
        &self,
        repo_id: Uuid,
        filename: &TargetFilename,
        content: Bytes,
    ) -> StorageResult<()> {
        let path = self.blob_path(repo_id, filename);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so concurrent readers never observe partial blobs.
        let tmp = path.with_extension("upload");
        tokio::fs::write(&tmp, &content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, repo_id: Uuid, filename: &TargetFilename) -> StorageResult<Bytes> {
        match tokio::fs::read(self.blob_path(repo_id, filename)).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{repo_id}/{filename}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, repo_id: Uuid, filename: &TargetFilename) -> StorageResult<()> {
        match tokio::fs::remove_file(self.blob_path(repo_id, filename)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn health_check(&self) -> StorageResult<()> {
        tokio::fs::metadata(&self.root).await?;
        Ok(())
    }
}
