//! Key generation request repository trait.

use crate::error::MetadataResult;
use crate::models::{KeyGenRequestRow, KeyRow};
use async_trait::async_trait;
use uuid::Uuid;

/// Lifecycle state of a key generation request.
///
/// Transitions are `REQUESTED -> (GENERATED | ERROR)`; `ERROR -> REQUESTED`
/// only via an explicit retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGenStatus {
    Requested,
    Generated,
    Error,
}

impl KeyGenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyGenStatus::Requested => "REQUESTED",
            KeyGenStatus::Generated => "GENERATED",
            KeyGenStatus::Error => "ERROR",
        }
    }
}

/// Repository for key generation requests.
#[async_trait]
pub trait KeyGenRepo: Send + Sync {
    /// Insert a new request in its initial state.
    async fn create_key_gen_request(&self, request: &KeyGenRequestRow) -> MetadataResult<()>;

    /// Fetch a request by ID.
    async fn get_key_gen_request(&self, id: Uuid) -> MetadataResult<Option<KeyGenRequestRow>>;

    /// All requests for a repo, oldest first.
    async fn key_gen_requests_for_repo(
        &self,
        repo_id: Uuid,
    ) -> MetadataResult<Vec<KeyGenRequestRow>>;

    /// Requests in state REQUESTED, oldest first, bounded.
    async fn pending_key_gen_requests(&self, limit: u32)
    -> MetadataResult<Vec<KeyGenRequestRow>>;

    /// Persist the generated key and mark the request GENERATED in one
    /// transaction. Fails if the request is already GENERATED.
    async fn complete_key_gen_request(&self, request_id: Uuid, key: &KeyRow)
    -> MetadataResult<()>;

    /// Mark a request ERROR with a (truncated) cause.
    async fn fail_key_gen_request(&self, request_id: Uuid, cause: &str) -> MetadataResult<()>;

    /// Move a repo's ERROR requests back to REQUESTED; returns how many.
    async fn retry_key_gen_requests(&self, repo_id: Uuid) -> MetadataResult<u64>;
}
