//! Application state shared across handlers.

use armory_core::config::KeyServerConfig;
use armory_metadata::MetadataStore;
use armory_vault::SecretStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<KeyServerConfig>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Secret store for private key material.
    pub vault: Arc<dyn SecretStore>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        config: KeyServerConfig,
        metadata: Arc<dyn MetadataStore>,
        vault: Arc<dyn SecretStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            metadata,
            vault,
        }
    }
}
