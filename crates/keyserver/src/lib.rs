//! Armory key server.
//!
//! Owns per-repo key material and asynchronous key generation, produces the
//! authoritative signed `root` role, applies rotations, validates externally
//! signed root updates, and acts as a signing oracle for the other roles.

pub mod error;
pub mod handlers;
pub mod keygen;
pub mod metrics;
pub mod roots;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
