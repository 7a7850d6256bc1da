//! Client-facing key-value API handlers.
//!
//! Writes go through consensus before touching the table.  In cabinet
//! mode a non-leader forwards PUT and DELETE to the current leader and
//! relays the leader's response; in cabinet++ mode every peer drives
//! the proposal itself.  Reads are always served locally, without
//! consensus.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics::gauge;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::consensus::{ConsensusMode, Operation};
use crate::errors::EngineError;
use crate::handlers::relay_response;
use crate::metrics::KEYS_TOTAL;
use crate::AppState;

/// Body of `POST /api/put`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutRequest {
    pub key: String,
    pub value: String,
}

/// Query string carrying a single key.
#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: String,
}

/// Query string for paginated scans.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Refresh the stored-keys gauge, best-effort.
fn update_keys_gauge(state: &AppState) {
    if let Ok(count) = state.store.count() {
        gauge!(KEYS_TOTAL).set(count as f64);
    }
}

/// `POST /api/put` -- consensus-gated insert-or-replace.
#[utoipa::path(
    post,
    path = "/api/put",
    tag = "KeyValue",
    operation_id = "PutKey",
    responses(
        (status = 200, description = "Key stored"),
        (status = 400, description = "Missing key"),
        (status = 409, description = "Consensus not reached"),
        (status = 502, description = "Could not reach the leader"),
        (status = 503, description = "No leader is currently known")
    )
)]
pub async fn put(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PutRequest>,
) -> Result<Response, EngineError> {
    if req.key.is_empty() {
        return Ok((StatusCode::BAD_REQUEST, "missing key").into_response());
    }

    let engine = &state.engine;
    if engine.mode() == ConsensusMode::Cabinet && !engine.is_leader() {
        let leader = engine.leader().ok_or(EngineError::LeaderUnknown)?;
        debug!(leader = %leader, key = %req.key, "forwarding PUT to leader");
        let url = format!("http://{leader}/api/put");
        let resp = state
            .forwarder
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|_| EngineError::PeerUnreachable { endpoint: leader })?;
        return Ok(relay_response(resp).await);
    }

    let op = Operation::put(req.key, req.value);
    engine.propose(op.clone()).await?;
    state.store.apply(&op)?;
    update_keys_gauge(&state);

    info!(key = %op.key, "PUT committed");
    Ok(StatusCode::OK.into_response())
}

/// `GET /api/get?key=` -- local point lookup, no consensus.
#[utoipa::path(
    get,
    path = "/api/get",
    tag = "KeyValue",
    operation_id = "GetKey",
    params(("key" = String, Query, description = "Key to look up")),
    responses(
        (status = 200, description = "Value found"),
        (status = 400, description = "Missing key"),
        (status = 404, description = "Key not found")
    )
)]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KeyQuery>,
) -> Result<Response, EngineError> {
    if query.key.is_empty() {
        return Ok((StatusCode::BAD_REQUEST, "missing key").into_response());
    }
    match state.store.get(&query.key)? {
        Some(value) => Ok(Json(serde_json::json!({ "value": value })).into_response()),
        None => Ok((StatusCode::NOT_FOUND, "key not found").into_response()),
    }
}

/// `DELETE /api/delete?key=` -- consensus-gated delete.
#[utoipa::path(
    delete,
    path = "/api/delete",
    tag = "KeyValue",
    operation_id = "DeleteKey",
    params(("key" = String, Query, description = "Key to delete")),
    responses(
        (status = 200, description = "Key deleted"),
        (status = 400, description = "Missing key"),
        (status = 409, description = "Consensus not reached"),
        (status = 502, description = "Could not reach the leader"),
        (status = 503, description = "No leader is currently known")
    )
)]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KeyQuery>,
) -> Result<Response, EngineError> {
    if query.key.is_empty() {
        return Ok((StatusCode::BAD_REQUEST, "missing key").into_response());
    }

    let engine = &state.engine;
    if engine.mode() == ConsensusMode::Cabinet && !engine.is_leader() {
        let leader = engine.leader().ok_or(EngineError::LeaderUnknown)?;
        debug!(leader = %leader, key = %query.key, "forwarding DELETE to leader");
        let url = format!("http://{leader}/api/delete");
        let resp = state
            .forwarder
            .delete(&url)
            .query(&[("key", &query.key)])
            .send()
            .await
            .map_err(|_| EngineError::PeerUnreachable { endpoint: leader })?;
        return Ok(relay_response(resp).await);
    }

    let op = Operation::delete(query.key);
    engine.propose(op.clone()).await?;
    state.store.apply(&op)?;
    update_keys_gauge(&state);

    info!(key = %op.key, "DELETE committed");
    Ok(StatusCode::OK.into_response())
}

/// `GET /api/get-all?page=&limit=` -- paginated scan, served locally.
#[utoipa::path(
    get,
    path = "/api/get-all",
    tag = "KeyValue",
    operation_id = "GetAllKeys",
    params(
        ("page" = Option<u64>, Query, description = "1-based page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)")
    ),
    responses((status = 200, description = "One page of key-value pairs"))
)]
pub async fn get_all(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Response, EngineError> {
    let page = state
        .store
        .page(query.page.unwrap_or(1), query.limit.unwrap_or(10))?;
    Ok(Json(page).into_response())
}
