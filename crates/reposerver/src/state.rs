//! Application state shared across handlers.

use crate::keyclient::KeyserverApi;
use armory_core::config::RepoServerConfig;
use armory_metadata::MetadataStore;
use armory_storage::TargetStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<RepoServerConfig>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Target blob storage.
    pub storage: Arc<dyn TargetStore>,
    /// Key server interface.
    pub keys: Arc<dyn KeyserverApi>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        config: RepoServerConfig,
        metadata: Arc<dyn MetadataStore>,
        storage: Arc<dyn TargetStore>,
        keys: Arc<dyn KeyserverApi>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            metadata,
            storage,
            keys,
        }
    }
}
