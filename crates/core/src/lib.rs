//! Core domain types for the Armory TUF repository service.
//!
//! This crate defines the vocabulary shared by the key server and the repo
//! server:
//! - Canonical JSON serialization used for hashing and signing
//! - TUF key documents, key IDs, and signature schemes
//! - Role documents (`root`, `targets`, `snapshot`, `timestamp`) and the
//!   signed payload envelope
//! - Target catalog entries and their custom metadata
//! - Configuration types for both server binaries

pub mod canonical;
pub mod config;
pub mod error;
pub mod keys;
pub mod roles;
pub mod targets;

pub use error::{Error, Result};

/// Request header carrying the optimistic checksum of the current `targets`
/// role for offline pushes. Also returned on `GET targets.json`.
pub const ROLE_CHECKSUM_HEADER: &str = "x-ats-role-checksum";

/// Request header carrying the tenant namespace resolved by the upstream
/// authentication layer.
pub const NAMESPACE_HEADER: &str = "x-ats-namespace";
