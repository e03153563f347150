//! Prometheus collectors and the `/metrics` endpoint


use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

lazy_static! {
    pub static ref ACTIVE_TARGETS: IntGauge =
        IntGauge::new("active_targets", "Registered targets, draining ones included")
            .expect("metric can not be created");

    pub static ref ACTIVE_SESSIONS: IntGauge =
        IntGauge::new("active_sessions", "Attached subscriber sessions")
            .expect("metric can not be created");

    pub static ref PUBLISHED_SNAPSHOTS: IntCounterVec = IntCounterVec::new(
        Opts::new("published_snapshots", "Endpoint sets published per target"),
        &["target"]
    )
    .expect("metric can not be created");

    pub static ref RESOLVE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("resolve_failures", "Failed resolver calls by error kind"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref SUBSCRIBER_OVERRUNS: IntCounterVec = IntCounterVec::new(
        Opts::new("subscriber_overruns", "Sessions disconnected for falling behind"),
        &["target"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

/// Adds every collector to `registry`.
pub fn register_custom_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(ACTIVE_TARGETS.clone()))?;
    registry.register(Box::new(ACTIVE_SESSIONS.clone()))?;
    registry.register(Box::new(PUBLISHED_SNAPSHOTS.clone()))?;
    registry.register(Box::new(RESOLVE_FAILURES.clone()))?;
    registry.register(Box::new(SUBSCRIBER_OVERRUNS.clone()))?;
    Ok(())
}

/// Drops the per-target series of a target that is no longer registered.
pub fn forget_target(target: &str) {
    let _ = PUBLISHED_SNAPSHOTS.remove_label_values(&[target]);
    let _ = SUBSCRIBER_OVERRUNS.remove_label_values(&[target]);
}

fn register_default_registry() {
    REGISTER.call_once(|| {
        if let Err(e) = register_custom_metrics(&REGISTRY) {
            error!("could not register metrics: {}", e);
        }
    });
}

/// Serves `/metrics` on `port` until `shutdown_signal` fires.
pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    register_default_registry();

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    info!("Metrics server listening on 0.0.0.0:{}", port);
    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(render_metrics(&REGISTRY))
}

/// Text exposition of `registry` followed by the process-wide default registry
pub fn render_metrics(registry: &Registry) -> String {
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    }
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!("could not encode prometheus metrics: {}", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}
