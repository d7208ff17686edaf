//! Secret store abstraction for private key material.
//!
//! Private keys are written to the vault exactly once and deleted at most
//! once ("taking a key offline"). Everything else in the system references
//! them by an opaque handle.

pub mod backends;
pub mod error;
pub mod store;

pub use backends::filesystem::FileVault;
pub use backends::memory::MemoryVault;
pub use error::{VaultError, VaultResult};
pub use store::SecretStore;

use armory_core::config::VaultConfig;
use std::sync::Arc;

/// Create a secret store from configuration.
pub async fn from_config(config: &VaultConfig) -> VaultResult<Arc<dyn SecretStore>> {
    match config {
        VaultConfig::Filesystem { path } => {
            let vault = FileVault::new(path).await?;
            Ok(Arc::new(vault) as Arc<dyn SecretStore>)
        }
        VaultConfig::Memory => Ok(Arc::new(MemoryVault::new()) as Arc<dyn SecretStore>),
    }
}
