//! Target blob storage for the Armory repo server.
//!
//! Stores uploaded target content keyed by `(repo_id, filename)`. Operations
//! are idempotent per key, so retried uploads and deletions are safe.

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use error::{StorageError, StorageResult};
pub use traits::TargetStore;

use armory_core::config::StorageConfig;
use std::sync::Arc;

/// Create a blob store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn TargetStore>> {
    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend) as Arc<dyn TargetStore>)
        }
    }
}
