//! HTTP request handlers: the client-facing key-value API and the
//! peer-to-peer consensus RPC surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub mod cluster;
pub mod kv;

/// Relay a proxied upstream response (status + body) to our client.
pub(crate) async fn relay_response(resp: reqwest::Response) -> Response {
    let status =
        StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = resp.bytes().await.unwrap_or_default();
    (status, body).into_response()
}
