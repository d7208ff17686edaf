//! Armory repo server.
//!
//! Owns the per-repo target catalog and the derived role documents
//! (`targets`, `snapshot`, `timestamp`). Enforces TUF consistency: versions
//! strictly increase, `snapshot` references the current `targets`,
//! `timestamp` references the current `snapshot`, hashes and lengths match
//! canonical JSON, and expiry is refreshed on read when stale. Supports
//! online (server-signed), offline (client-signed), and delegated targets
//! publishing.

pub mod error;
pub mod handlers;
pub mod keyclient;
pub mod metrics;
pub mod offline;
pub mod rolegen;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use keyclient::{HttpKeyserverClient, KeyserverApi};
pub use routes::create_router;
pub use state::AppState;
