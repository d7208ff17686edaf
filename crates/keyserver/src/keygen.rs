//! Background key generation engine.
//!
//! A scheduler polls for key generation requests in state REQUESTED
//! (batched, bounded fetch size) and processes each: generate a keypair of
//! the requested type and size, persist the private half to the vault, then
//! persist the public key and the GENERATED transition in one transaction.
//! Failures park the request in ERROR with a truncated cause; retry is an
//! explicit admin operation.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use armory_core::keys::{KeyId, KeyType, TufKey};
use armory_core::roles::RoleType;
use armory_metadata::models::{KeyGenRequestRow, KeyRow};
use armory_signer::KeyPair;
use std::collections::HashSet;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Error causes are truncated to this length before persisting.
const MAX_CAUSE_LENGTH: usize = 1024;

/// Spawn the background worker that drains the request queue.
pub fn spawn_keygen_worker(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = state.config.keygen.poll_interval();
        tracing::info!(
            poll_interval_secs = interval.as_secs(),
            batch_size = state.config.keygen.batch_size,
            "key generation worker started"
        );

        loop {
            tokio::time::sleep(interval).await;
            match process_pending(&state).await {
                Ok(0) => {}
                Ok(count) => {
                    tracing::info!(count, "key generation sweep completed");
                }
                Err(e) => {
                    tracing::error!(error = %e, "key generation sweep failed");
                }
            }
        }
    })
}

/// Process one batch of pending requests. Returns how many keys were
/// generated.
pub async fn process_pending(state: &AppState) -> ApiResult<usize> {
    let pending = state
        .metadata
        .pending_key_gen_requests(state.config.keygen.batch_size)
        .await?;

    let mut generated = 0;
    let mut touched_repos = HashSet::new();

    for request in &pending {
        match generate_for_request(state, request).await {
            Ok(key_id) => {
                generated += 1;
                touched_repos.insert(request.repo_id);
                crate::metrics::KEYS_GENERATED.inc();
                tracing::info!(
                    request_id = %request.id,
                    repo_id = %request.repo_id,
                    role_type = %request.role_type,
                    key_id = %key_id,
                    "key generated"
                );
            }
            Err(e) => {
                crate::metrics::KEYGEN_FAILURES.inc();
                tracing::error!(
                    request_id = %request.id,
                    repo_id = %request.repo_id,
                    error = %e,
                    "key generation failed"
                );
                let cause = truncate_cause(&e.to_string());
                if let Err(e) = state.metadata.fail_key_gen_request(request.id, &cause).await {
                    tracing::error!(request_id = %request.id, error = %e, "failed to park errored request");
                }
            }
        }
    }

    // Finalize root documents for repos whose key sets just completed.
    for repo_id in touched_repos {
        match crate::roots::initialize_if_ready(state, repo_id).await {
            Ok(true) => {
                tracing::info!(repo_id = %repo_id, "initial root role generated");
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(repo_id = %repo_id, error = %e, "failed to finalize root role");
            }
        }
    }

    Ok(generated)
}

/// Generate the key for one request and persist it together with the
/// GENERATED transition.
pub async fn generate_for_request(
    state: &AppState,
    request: &KeyGenRequestRow,
) -> ApiResult<KeyId> {
    let key_type: KeyType = request
        .key_type
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("unknown key type '{}'", request.key_type)))?;
    let size = u32::try_from(request.key_size)
        .map_err(|_| ApiError::BadRequest(format!("invalid key size {}", request.key_size)))?;

    // RSA generation is CPU-bound for seconds; keep it off the runtime.
    let keypair = tokio::task::spawn_blocking(move || KeyPair::generate(key_type, size))
        .await
        .map_err(|e| ApiError::Internal(format!("key generation task failed: {e}")))??;

    let tuf_key = keypair.tuf_key()?;
    let key_id = tuf_key.key_id()?;
    let private_ref = private_ref_for(request.repo_id, &key_id);

    state
        .vault
        .put(&private_ref, &keypair.private_pem()?)
        .await?;

    let row = KeyRow {
        key_id: key_id.to_string(),
        repo_id: request.repo_id,
        role_type: request.role_type.clone(),
        key_type: request.key_type.clone(),
        public_key: serde_json::to_string(&tuf_key)
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        private_ref: Some(private_ref),
        created_at: OffsetDateTime::now_utc(),
    };

    state
        .metadata
        .complete_key_gen_request(request.id, &row)
        .await?;

    Ok(key_id)
}

/// Generate a keypair outside the request queue (rotation, role additions)
/// and persist it.
pub async fn generate_and_store_key(
    state: &AppState,
    repo_id: Uuid,
    role: RoleType,
    key_type: KeyType,
) -> ApiResult<(KeyId, TufKey)> {
    let size = key_type.default_key_size();
    let keypair = tokio::task::spawn_blocking(move || KeyPair::generate(key_type, size))
        .await
        .map_err(|e| ApiError::Internal(format!("key generation task failed: {e}")))??;

    let tuf_key = keypair.tuf_key()?;
    let key_id = tuf_key.key_id()?;
    let private_ref = private_ref_for(repo_id, &key_id);

    state
        .vault
        .put(&private_ref, &keypair.private_pem()?)
        .await?;

    let row = KeyRow {
        key_id: key_id.to_string(),
        repo_id,
        role_type: role.to_string(),
        key_type: key_type.to_string(),
        public_key: serde_json::to_string(&tuf_key)
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        private_ref: Some(private_ref),
        created_at: OffsetDateTime::now_utc(),
    };
    state.metadata.insert_key(&row).await?;

    Ok((key_id, tuf_key))
}

/// Vault handle for a repo-scoped private key.
pub fn private_ref_for(repo_id: Uuid, key_id: &KeyId) -> String {
    format!("{repo_id}/{key_id}")
}

fn truncate_cause(cause: &str) -> String {
    cause.chars().take(MAX_CAUSE_LENGTH).collect()
}
