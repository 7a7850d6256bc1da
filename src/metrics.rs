//! Prometheus metrics for CabinetKV.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, provides a Tower-compatible middleware for
//! HTTP RED metrics, and exposes the `/metrics` endpoint handler.

use axum::http::Request;
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, path, status.
pub const HTTP_REQUESTS_TOTAL: &str = "cabinetkv_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method, path.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "cabinetkv_http_request_duration_seconds";

/// Total consensus proposals (counter). Labels: mode, outcome.
pub const CONSENSUS_PROPOSALS_TOTAL: &str = "cabinetkv_proposals_total";

/// Proposal duration in seconds (histogram). Labels: mode.
pub const CONSENSUS_PROPOSAL_DURATION_SECONDS: &str = "cabinetkv_proposal_duration_seconds";

/// Total failed heartbeat probes (counter). Labels: peer.
pub const HEARTBEAT_FAILURES_TOTAL: &str = "cabinetkv_heartbeat_failures_total";

/// Total elections driven by this peer (counter). Labels: outcome.
pub const CONSENSUS_ELECTIONS_TOTAL: &str = "cabinetkv_elections_total";

/// Total replication attempts (counter). Labels: outcome.
pub const REPLICATIONS_TOTAL: &str = "cabinetkv_replications_total";

/// Keys currently stored in the key-value table (gauge).
pub const KEYS_TOTAL: &str = "cabinetkv_keys_total";

// -- Global recorder installation ---------------------------------------------

/// Singleton handle to the Prometheus recorder.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent -- safe to call
/// multiple times (e.g. in tests). Returns a reference to the global handle.
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder")
    })
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(CONSENSUS_PROPOSALS_TOTAL, "Total consensus proposals by outcome");
    describe_histogram!(
        CONSENSUS_PROPOSAL_DURATION_SECONDS,
        "Proposal duration in seconds"
    );
    describe_counter!(HEARTBEAT_FAILURES_TOTAL, "Total failed heartbeat probes");
    describe_counter!(CONSENSUS_ELECTIONS_TOTAL, "Total elections by outcome");
    describe_counter!(REPLICATIONS_TOTAL, "Total replication attempts by outcome");
    describe_gauge!(KEYS_TOTAL, "Keys currently stored");
}

// -- Metrics middleware -------------------------------------------------------

/// Axum middleware that records HTTP RED metrics for every request.
///
/// Excludes `/metrics` from self-instrumentation to avoid feedback loops.
/// Must be the outermost layer so it captures the full request lifecycle.
pub async fn metrics_middleware(
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    // Do not instrument the metrics endpoint itself.
    if req.uri().path() == "/metrics" {
        return next.run(req).await;
    }

    let start = Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

// -- Path normalization -------------------------------------------------------

/// Normalize a request path for metric labels.
///
/// The API surface is a fixed set of routes, so known paths pass
/// through; anything else collapses to `/other` to keep label
/// cardinality bounded.
fn normalize_path(path: &str) -> String {
    match path {
        "/" | "/health" | "/metrics" | "/docs" | "/openapi.json" => path.to_string(),
        p if p.starts_with("/api/") => p.to_string(),
        p if p.starts_with("/docs/") => "/docs".to_string(),
        _ => "/other".to_string(),
    }
}

// -- Metrics endpoint handler -------------------------------------------------

/// `GET /metrics` -- render the Prometheus exposition text.
pub async fn metrics_handler() -> impl IntoResponse {
    let handle = init_metrics();
    (
        [("content-type", "text/plain; version=0.0.4")],
        handle.render(),
    )
}
