//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::{delete, get, post, put};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Health check (intentionally unauthenticated for probes)
        .route("/health", get(handlers::health_check))
        // Root role lifecycle
        .route(
            "/root/{repo_id}",
            post(handlers::create_root)
                .get(handlers::get_root)
                .put(handlers::retry_key_generation),
        )
        .route("/root/{repo_id}/rotate", put(handlers::rotate_root))
        .route(
            "/root/{repo_id}/unsigned",
            get(handlers::get_unsigned_root).post(handlers::put_signed_root),
        )
        .route(
            "/root/{repo_id}/roles/offline-updates",
            put(handlers::add_offline_updates_role),
        )
        .route(
            "/root/{repo_id}/roles/remote-sessions",
            put(handlers::add_remote_sessions_role),
        )
        // Private key lifecycle
        .route(
            "/root/{repo_id}/private_keys/{key_id}",
            delete(handlers::delete_private_key),
        )
        // Historical roots (GET, numeric) and the signing oracle (POST, role
        // name) share one capture segment. Static siblings above win.
        .route(
            "/root/{repo_id}/{param}",
            get(handlers::get_root_version).post(handlers::sign_payload),
        );

    if state.config.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
