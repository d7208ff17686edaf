//! In-memory secret store for tests and ephemeral deployments.

use crate::error::{VaultError, VaultResult};
use crate::store::SecretStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Keeps secrets in process memory. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryVault {
    secrets: RwLock<HashMap<String, String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemoryVault {
    async fn put(&self, handle: &str, secret: &str) -> VaultResult<()> {
        self.secrets
            .write()
            .expect("vault lock poisoned")
            .insert(handle.to_string(), secret.to_string());
        Ok(())
    }

    async fn get(&self, handle: &str) -> VaultResult<String> {
        self.secrets
            .read()
            .expect("vault lock poisoned")
            .get(handle)
            .cloned()
            .ok_or_else(|| VaultError::NotFound(handle.to_string()))
    }

    async fn delete(&self, handle: &str) -> VaultResult<()> {
        self.secrets
            .write()
            .expect("vault lock poisoned")
            .remove(handle);
        Ok(())
    }

    async fn health_check(&self) -> VaultResult<()> {
        Ok(())
    }
}
