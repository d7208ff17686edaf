//! Secret store trait.

use crate::error::VaultResult;
use async_trait::async_trait;

/// Storage for private key material, addressed by opaque handle.
///
/// Handles are written exactly once; `delete` is idempotent so that taking a
/// key offline twice is a no-op.
#[async_trait]
pub trait SecretStore: Send + Sync + 'static {
    /// Store a secret under the given handle, replacing any previous value.
    async fn put(&self, handle: &str, secret: &str) -> VaultResult<()>;

    /// Fetch a secret. Fails with `NotFound` when the handle is absent.
    async fn get(&self, handle: &str) -> VaultResult<String>;

    /// Remove a secret. Succeeds even when the handle is already absent.
    async fn delete(&self, handle: &str) -> VaultResult<()>;

    /// Verify the backend is reachable and writable.
    async fn health_check(&self) -> VaultResult<()>;
}
