//! Repo server test utilities.
//!
//! Tests run the repo server against an in-process key server that
//! implements the same [`KeyserverApi`] trait as the HTTP client. The two
//! cores keep separate databases, matching the shared-nothing deployment.

use armory_core::config::{KeyServerConfig, RepoServerConfig};
use armory_core::keys::KeyType;
use armory_core::roles::{RoleType, RootRole, SignedPayload};
use armory_metadata::{MetadataStore, SqliteStore};
use armory_reposerver::keyclient::{KeyClientError, KeyClientResult, KeyserverApi};
use armory_reposerver::{AppState, create_router};
use armory_storage::{FilesystemBackend, TargetStore};
use armory_vault::{MemoryVault, SecretStore};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

/// In-process key server speaking the repo server's client trait.
pub struct LocalKeyserver {
    pub state: armory_keyserver::AppState,
}

fn map_keyserver_error(e: armory_keyserver::ApiError) -> KeyClientError {
    use armory_keyserver::ApiError as E;
    match e {
        E::KeysNotReady(m) => KeyClientError::KeysNotReady(m),
        E::RoleKeyNotFound(m) => KeyClientError::RoleKeyNotFound(m),
        E::MissingEntity(m) => KeyClientError::NotFound(m),
        E::EntityAlreadyExists(m) => KeyClientError::Conflict(m),
        other => KeyClientError::Unexpected {
            status: 500,
            body: other.to_string(),
        },
    }
}

#[async_trait]
impl KeyserverApi for LocalKeyserver {
    async fn create_root(&self, repo_id: Uuid, key_type: KeyType) -> KeyClientResult<Vec<Uuid>> {
        // Synchronous generation keeps tests deterministic.
        armory_keyserver::roots::create_root(&self.state, repo_id, key_type, 1, true)
            .await
            .map_err(map_keyserver_error)
    }

    async fn fetch_root(
        &self,
        repo_id: Uuid,
        expires_not_before: Option<OffsetDateTime>,
    ) -> KeyClientResult<SignedPayload<RootRole>> {
        armory_keyserver::roots::find_fresh(&self.state, repo_id, expires_not_before)
            .await
            .map_err(map_keyserver_error)
    }

    async fn fetch_root_version(
        &self,
        repo_id: Uuid,
        version: u64,
    ) -> KeyClientResult<SignedPayload<RootRole>> {
        armory_keyserver::roots::find_version(&self.state, repo_id, version)
            .await
            .map_err(map_keyserver_error)
    }

    async fn sign(
        &self,
        repo_id: Uuid,
        role: RoleType,
        payload: Value,
    ) -> KeyClientResult<SignedPayload<Value>> {
        armory_keyserver::roots::sign_payload(&self.state, repo_id, role, payload)
            .await
            .map_err(map_keyserver_error)
    }
}

/// A repo server wired to an in-process key server.
#[allow(dead_code)]
pub struct TestRepoServer {
    pub router: axum::Router,
    pub state: AppState,
    pub keyserver: armory_keyserver::AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestRepoServer {
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp directory");

        let ks_metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp_dir.path().join("keyserver.db"))
                .await
                .expect("failed to create key server metadata store"),
        );
        let vault: Arc<dyn SecretStore> = Arc::new(MemoryVault::new());
        let keyserver = armory_keyserver::AppState::new(
            KeyServerConfig::for_testing(temp_dir.path()),
            ks_metadata,
            vault,
        );

        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp_dir.path().join("reposerver.db"))
                .await
                .expect("failed to create repo server metadata store"),
        );
        let storage: Arc<dyn TargetStore> = Arc::new(
            FilesystemBackend::new(temp_dir.path().join("targets"))
                .await
                .expect("failed to create target storage"),
        );
        let keys = Arc::new(LocalKeyserver {
            state: keyserver.clone(),
        });

        let config = RepoServerConfig::for_testing(temp_dir.path());
        let state = AppState::new(config, metadata, storage, keys);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            keyserver,
            _temp_dir: temp_dir,
        }
    }

    /// Create a repo through the HTTP surface and return its ID.
    pub async fn create_repo(&self, namespace: &str) -> Uuid {
        let (status, _, body) = self
            .request(
                "POST",
                "/user_repo",
                Some(serde_json::json!({"keyType": "ed25519"})),
                &[("x-ats-namespace", namespace)],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create repo failed: {body}");
        serde_json::from_value(body).expect("repo id")
    }

    /// Send a JSON request and collect status, headers, and parsed body.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = match body {
            Some(v) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let response_headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, response_headers, json)
    }

    /// Send a raw-body request (target uploads).
    pub async fn request_raw(
        &self,
        method: &str,
        uri: &str,
        body: Vec<u8>,
    ) -> (StatusCode, HeaderMap, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, bytes.to_vec())
    }
}
