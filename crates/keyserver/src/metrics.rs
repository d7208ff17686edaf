//! Prometheus metrics for the key server.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static KEYS_GENERATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "armory_keyserver_keys_generated_total",
        "Total number of keys generated",
    )
    .expect("metric creation failed")
});

pub static KEYGEN_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "armory_keyserver_keygen_failures_total",
        "Total number of key generation requests parked in ERROR",
    )
    .expect("metric creation failed")
});

pub static ROOT_ROLES_SIGNED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "armory_keyserver_root_roles_signed_total",
        "Total number of root role versions signed and persisted",
    )
    .expect("metric creation failed")
});

pub static PAYLOADS_SIGNED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "armory_keyserver_payloads_signed_total",
        "Total number of payloads signed by the signing oracle",
    )
    .expect("metric creation failed")
});

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry. Idempotent.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(KEYS_GENERATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(KEYGEN_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ROOT_ROLES_SIGNED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PAYLOADS_SIGNED.clone()))
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
