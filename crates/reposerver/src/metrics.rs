//! Prometheus metrics for the repo server.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static CASCADES_GENERATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "armory_reposerver_cascades_generated_total",
        "Total number of targets/snapshot/timestamp cascades generated",
    )
    .expect("metric creation failed")
});

pub static OFFLINE_PUSHES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "armory_reposerver_offline_pushes_total",
        "Total number of accepted offline-signed targets pushes",
    )
    .expect("metric creation failed")
});

pub static TARGET_UPLOADS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "armory_reposerver_target_uploads_total",
        "Total number of target blobs uploaded",
    )
    .expect("metric creation failed")
});

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry. Idempotent.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(CASCADES_GENERATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(OFFLINE_PUSHES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(TARGET_UPLOADS.clone()))
            .expect("metric registration failed");
    });
}

/// Serve the metrics in Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    (StatusCode::OK, String::from_utf8_lossy(&buffer).to_string())
}
