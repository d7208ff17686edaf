//! Client interface to the key server.
//!
//! The key server and the repo server share no in-memory state; this trait
//! is the only channel between them, implemented over HTTP in production and
//! in-process in tests.

use armory_core::keys::KeyType;
use armory_core::roles::{RoleType, RootRole, SignedPayload};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Key server call errors.
#[derive(Debug, Error)]
pub enum KeyClientError {
    #[error("keys not ready: {0}")]
    KeysNotReady(String),

    #[error("no usable key for role: {0}")]
    RoleKeyNotFound(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected key server response ({status}): {body}")]
    Unexpected { status: u16, body: String },
}

/// Result type for key server calls.
pub type KeyClientResult<T> = std::result::Result<T, KeyClientError>;

/// Operations the repo server needs from the key server.
#[async_trait]
pub trait KeyserverApi: Send + Sync + 'static {
    /// Request creation of the key hierarchy for a new repo. Returns the key
    /// generation request IDs.
    async fn create_root(&self, repo_id: Uuid, key_type: KeyType) -> KeyClientResult<Vec<Uuid>>;

    /// Fetch the current root, refreshed to expire no earlier than the
    /// optional floor.
    async fn fetch_root(
        &self,
        repo_id: Uuid,
        expires_not_before: Option<OffsetDateTime>,
    ) -> KeyClientResult<SignedPayload<RootRole>>;

    /// Fetch a historical root version.
    async fn fetch_root_version(
        &self,
        repo_id: Uuid,
        version: u64,
    ) -> KeyClientResult<SignedPayload<RootRole>>;

    /// Have the key server sign a role payload with the role's online keys.
    async fn sign(
        &self,
        repo_id: Uuid,
        role: RoleType,
        payload: Value,
    ) -> KeyClientResult<SignedPayload<Value>>;
}

/// HTTP implementation of [`KeyserverApi`].
#[derive(Clone)]
pub struct HttpKeyserverClient {
    http: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpKeyserverClient {
    pub fn new(base_url: &str) -> KeyClientResult<Self> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| KeyClientError::Transport(format!("invalid key server URL: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    fn url(&self, path: &str) -> KeyClientResult<reqwest::Url> {
        self.base_url
            .join(path)
            .map_err(|e| KeyClientError::Transport(format!("failed to build URL: {e}")))
    }

    async fn handle<T: DeserializeOwned>(response: reqwest::Response) -> KeyClientResult<T> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| KeyClientError::Unexpected {
                status: status.as_u16(),
                body: format!("malformed response: {e}"),
            });
        }

        let description = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("description").and_then(|d| d.as_str()).map(String::from))
            .unwrap_or(body);

        Err(match status.as_u16() {
            404 => KeyClientError::NotFound(description),
            409 => KeyClientError::Conflict(description),
            412 => KeyClientError::RoleKeyNotFound(description),
            424 => KeyClientError::KeysNotReady(description),
            _ => KeyClientError::Unexpected {
                status: status.as_u16(),
                body: description,
            },
        })
    }
}

#[async_trait]
impl KeyserverApi for HttpKeyserverClient {
    async fn create_root(&self, repo_id: Uuid, key_type: KeyType) -> KeyClientResult<Vec<Uuid>> {
        let url = self.url(&format!("/root/{repo_id}"))?;
        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({"keyType": key_type, "threshold": 1}))
            .send()
            .await
            .map_err(|e| KeyClientError::Transport(e.to_string()))?;
        Self::handle(response).await
    }

    async fn fetch_root(
        &self,
        repo_id: Uuid,
        expires_not_before: Option<OffsetDateTime>,
    ) -> KeyClientResult<SignedPayload<RootRole>> {
        let mut url = self.url(&format!("/root/{repo_id}"))?;
        if let Some(floor) = expires_not_before {
            let formatted = floor
                .format(&Rfc3339)
                .map_err(|e| KeyClientError::Transport(e.to_string()))?;
            url.query_pairs_mut()
                .append_pair("expiresNotBefore", &formatted);
        }
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| KeyClientError::Transport(e.to_string()))?;
        Self::handle(response).await
    }

    async fn fetch_root_version(
        &self,
        repo_id: Uuid,
        version: u64,
    ) -> KeyClientResult<SignedPayload<RootRole>> {
        let url = self.url(&format!("/root/{repo_id}/{version}"))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| KeyClientError::Transport(e.to_string()))?;
        Self::handle(response).await
    }

    async fn sign(
        &self,
        repo_id: Uuid,
        role: RoleType,
        payload: Value,
    ) -> KeyClientResult<SignedPayload<Value>> {
        let url = self.url(&format!("/root/{repo_id}/{role}"))?;
        let response = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| KeyClientError::Transport(e.to_string()))?;
        Self::handle(response).await
    }
}
