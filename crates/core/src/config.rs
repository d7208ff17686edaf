//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::Duration;

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database file.
    Sqlite {
        /// Path to the database file.
        path: PathBuf,
    },
}

/// Secret store configuration for private key material.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VaultConfig {
    /// One file per secret under a root directory.
    Filesystem {
        /// Root directory for secrets.
        path: PathBuf,
    },
    /// In-memory store. Secrets do not survive a restart.
    Memory,
}

/// Target blob store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for target blobs.
        path: PathBuf,
    },
}

/// Default lifetimes for freshly generated role documents, in days.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoleTtlConfig {
    #[serde(default = "default_root_days")]
    pub root_days: i64,
    #[serde(default = "default_targets_days")]
    pub targets_days: i64,
    #[serde(default = "default_snapshot_days")]
    pub snapshot_days: i64,
    #[serde(default = "default_timestamp_days")]
    pub timestamp_days: i64,
}

fn default_root_days() -> i64 {
    365
}

fn default_targets_days() -> i64 {
    31
}

fn default_snapshot_days() -> i64 {
    1
}

fn default_timestamp_days() -> i64 {
    1
}

impl Default for RoleTtlConfig {
    fn default() -> Self {
        Self {
            root_days: default_root_days(),
            targets_days: default_targets_days(),
            snapshot_days: default_snapshot_days(),
            timestamp_days: default_timestamp_days(),
        }
    }
}

impl RoleTtlConfig {
    pub fn root_ttl(&self) -> Duration {
        Duration::days(self.root_days)
    }

    pub fn targets_ttl(&self) -> Duration {
        Duration::days(self.targets_days)
    }

    pub fn snapshot_ttl(&self) -> Duration {
        Duration::days(self.snapshot_days)
    }

    pub fn timestamp_ttl(&self) -> Duration {
        Duration::days(self.timestamp_days)
    }
}

/// Key generation worker configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyGenConfig {
    /// Maximum number of pending requests fetched per poll.
    #[serde(default = "default_keygen_batch_size")]
    pub batch_size: u32,
    /// Seconds between polls of the request queue.
    #[serde(default = "default_keygen_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_keygen_batch_size() -> u32 {
    1024
}

fn default_keygen_poll_interval_secs() -> u64 {
    3
}

impl Default for KeyGenConfig {
    fn default() -> Self {
        Self {
            batch_size: default_keygen_batch_size(),
            poll_interval_secs: default_keygen_poll_interval_secs(),
        }
    }
}

impl KeyGenConfig {
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Pagination defaults for listing endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_page_limit")]
    pub default_limit: u64,
    #[serde(default = "default_page_limit_cap")]
    pub max_limit: u64,
}

fn default_page_limit() -> u64 {
    50
}

fn default_page_limit_cap() -> u64 {
    1000
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_page_limit(),
            max_limit: default_page_limit_cap(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

/// Key server application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyServerConfig {
    /// Bind address (e.g. "0.0.0.0:8084").
    #[serde(default = "default_keyserver_bind")]
    pub bind: String,
    pub metadata: MetadataConfig,
    pub vault: VaultConfig,
    #[serde(default)]
    pub keygen: KeyGenConfig,
    #[serde(default)]
    pub tuf: RoleTtlConfig,
    /// Enable the /metrics endpoint for Prometheus scraping.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_keyserver_bind() -> String {
    "127.0.0.1:8084".to_string()
}

impl KeyServerConfig {
    /// Configuration backed by a temp directory. For tests only.
    pub fn for_testing(data_dir: &Path) -> Self {
        Self {
            bind: default_keyserver_bind(),
            metadata: MetadataConfig::Sqlite {
                path: data_dir.join("keyserver.db"),
            },
            vault: VaultConfig::Memory,
            keygen: KeyGenConfig::default(),
            tuf: RoleTtlConfig::default(),
            metrics_enabled: false,
        }
    }
}

/// Key server endpoint as seen from the repo server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyserverClientConfig {
    /// Base URL of the key server (e.g. "http://127.0.0.1:8084").
    pub base_url: String,
}

/// Repo server application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepoServerConfig {
    /// Bind address (e.g. "0.0.0.0:8085").
    #[serde(default = "default_reposerver_bind")]
    pub bind: String,
    pub metadata: MetadataConfig,
    pub storage: StorageConfig,
    pub keyserver: KeyserverClientConfig,
    #[serde(default)]
    pub tuf: RoleTtlConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Maximum accepted target upload size in bytes.
    #[serde(default = "default_max_target_bytes")]
    pub max_target_bytes: u64,
    /// Enable the /metrics endpoint for Prometheus scraping.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_reposerver_bind() -> String {
    "127.0.0.1:8085".to_string()
}

fn default_max_target_bytes() -> u64 {
    3_000_000_000
}

impl RepoServerConfig {
    /// Configuration backed by a temp directory. For tests only.
    pub fn for_testing(data_dir: &Path) -> Self {
        Self {
            bind: default_reposerver_bind(),
            metadata: MetadataConfig::Sqlite {
                path: data_dir.join("reposerver.db"),
            },
            storage: StorageConfig::Filesystem {
                path: data_dir.join("targets"),
            },
            keyserver: KeyserverClientConfig {
                base_url: "http://127.0.0.1:8084".to_string(),
            },
            tuf: RoleTtlConfig::default(),
            pagination: PaginationConfig::default(),
            max_target_bytes: default_max_target_bytes(),
            metrics_enabled: false,
        }
    }
}
