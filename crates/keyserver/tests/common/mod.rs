//! Key server test utilities.

use armory_core::config::KeyServerConfig;
use armory_keyserver::AppState;
use armory_metadata::{MetadataStore, SqliteStore};
use armory_vault::{MemoryVault, SecretStore};
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestKeyserver {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestKeyserver {
    /// Create a new test server with a temporary database and in-memory vault.
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp directory");

        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp_dir.path().join("keyserver.db"))
                .await
                .expect("failed to create metadata store"),
        );
        let vault: Arc<dyn SecretStore> = Arc::new(MemoryVault::new());

        let config = KeyServerConfig::for_testing(temp_dir.path());
        let state = AppState::new(config, metadata, vault);
        let router = armory_keyserver::create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }
}
