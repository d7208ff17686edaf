//! Metadata store abstraction and implementations for Armory.
//!
//! This crate provides the control-plane data model shared by the key server
//! and the repo server:
//! - Key generation requests and their lifecycle
//! - Public key records with secret-store handles
//! - Immutable signed root role versions
//! - The per-repo target catalog
//! - Current signed role documents with strict version bumping
//! - Delegated targets documents
//! - Repo registrations and per-repo expiry floors

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use store::{MetadataStore, SqliteStore};

use armory_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
