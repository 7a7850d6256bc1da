//! Axum router construction and route mapping.
//!
//! The [`app`] function wires the client-facing key-value API, the
//! peer-to-peer consensus RPC endpoints, and the infrastructure
//! endpoints (health, metrics, docs) into a ready-to-serve
//! [`axum::Router`].

use axum::{
    http::{HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::generate_request_id;
use crate::handlers;
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

// -- OpenAPI specification ----------------------------------------------------

/// OpenAPI documentation for the client-facing CabinetKV API.  The peer
/// RPC endpoints are cluster-internal and intentionally undocumented.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "CabinetKV API",
        version = "0.1.0",
        description = "Replicated key-value store with weighted-quorum consensus"
    ),
    paths(
        health_check,
        crate::handlers::kv::put,
        crate::handlers::kv::get,
        crate::handlers::kv::delete,
        crate::handlers::kv::get_all,
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "KeyValue", description = "Replicated key-value operations"),
    )
)]
struct ApiDoc;

/// Build the axum [`Router`] with every route.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    let openapi = ApiDoc::openapi();

    Router::new()
        // Infrastructure endpoints.
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        // Client-facing key-value API.
        .route("/api/put", post(handlers::kv::put))
        .route("/api/get", get(handlers::kv::get))
        .route("/api/delete", delete(handlers::kv::delete))
        .route("/api/get-all", get(handlers::kv::get_all))
        // Peer-to-peer consensus RPCs.
        .route("/api/approve", post(handlers::cluster::approve))
        .route("/api/replicate", post(handlers::cluster::replicate))
        .route("/api/heartbeat", get(handlers::cluster::heartbeat))
        .route("/api/leader", get(handlers::cluster::leader))
        .route("/api/set-leader", post(handlers::cluster::set_leader))
        .route("/api/priority", get(handlers::cluster::priority))
        .route("/api/status", get(handlers::cluster::status))
        .route("/api/weights", get(handlers::cluster::weights))
        .route(
            "/api/notify-consensus",
            post(handlers::cluster::notify_consensus),
        )
        .route("/api/mode", get(handlers::cluster::mode))
        // Swagger UI at /docs, OpenAPI spec at /openapi.json.
        .merge(SwaggerUi::new("/docs").url("/openapi.json", openapi))
        // Application state shared across all handlers.
        .with_state(state)
        // Layer ordering: inner layers run first, outer layers wrap them.
        .layer(middleware::from_fn(common_headers_middleware))
        // metrics_middleware is outer (captures full request lifecycle).
        .layer(middleware::from_fn(metrics_middleware))
}

// -- Common headers middleware -----------------------------------------------

/// Tower middleware that adds common response headers to every response:
/// - `x-request-id`: 16-character uppercase hex string
/// - `Date`: RFC 7231 formatted timestamp
/// - `Server`: `CabinetKV`
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key("x-request-id") {
        let request_id = generate_request_id();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert("x-request-id", value);
        }
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    if let Ok(value) = HeaderValue::from_str(&date) {
        headers.insert("date", value);
    }
    headers.insert("server", HeaderValue::from_static("CabinetKV"));

    response
}

// -- Health check ------------------------------------------------------------

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Health check OK")
    )
)]
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}
