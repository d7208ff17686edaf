//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post, put};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let max_body = usize::try_from(state.config.max_target_bytes).unwrap_or(usize::MAX);

    let mut router = Router::new()
        // Health check (intentionally unauthenticated for probes)
        .route("/health", get(handlers::health_check))
        // Repo creation for an authenticated namespace
        .route("/user_repo", post(handlers::create_repo))
        // Offline-signed targets intake
        .route(
            "/repo/{repo_id}/targets",
            put(handlers::put_offline_targets),
        )
        // Catalog listing
        .route(
            "/repo/{repo_id}/target_items",
            get(handlers::list_target_items),
        )
        // Per-repo expiry floor. The static segments win over the wildcard
        // target routes below.
        .route(
            "/repo/{repo_id}/targets/expire/not-before",
            put(handlers::set_expire_not_before),
        )
        // Catalog mutation and blob transfer
        .route(
            "/repo/{repo_id}/targets/{*filename}",
            post(handlers::add_target)
                .put(handlers::upload_target)
                .delete(handlers::delete_target)
                .patch(handlers::edit_target)
                .get(handlers::get_target_blob),
        )
        .route(
            "/repo/{repo_id}/proprietary-custom/{*filename}",
            patch(handlers::patch_proprietary_custom),
        )
        // Delegated targets
        .route(
            "/repo/{repo_id}/delegations/{name}",
            put(handlers::put_delegation).get(handlers::get_delegation),
        )
        // Role documents: root.json, {n}.root.json, targets.json,
        // snapshot.json, timestamp.json
        .route("/repo/{repo_id}/{role_file}", get(handlers::get_role_file));

    if state.config.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
