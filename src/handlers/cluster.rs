//! Peer-to-peer consensus RPC handlers.
//!
//! These endpoints are spoken only between cluster members: approval
//! requests during proposals, replication of committed operations,
//! heartbeat probes, and the leadership bookkeeping the election state
//! machine relies on.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, info};

use crate::consensus::messages::{ConsensusNotice, LeaderInfo, ModeInfo, Operation};
use crate::errors::EngineError;
use crate::handlers::relay_response;
use crate::AppState;

/// `POST /api/approve` -- vote on a proposal.
///
/// Followers approve unconditionally (optimistic follower); the commit
/// decision happens on the proposer after counting.  A leader never
/// approves someone else's proposal.
pub async fn approve(
    State(state): State<Arc<AppState>>,
    Json(op): Json<Operation>,
) -> Response {
    if state.engine.is_leader() {
        debug!(key = %op.key, "rejecting approval request: this peer is the leader");
        return (StatusCode::FORBIDDEN, "leaders cannot approve proposals").into_response();
    }
    debug!(op = op.kind.as_str(), key = %op.key, "approval granted");
    StatusCode::OK.into_response()
}

/// `POST /api/replicate` -- apply a committed operation locally.
///
/// Refresh operations are consensus-only and acknowledged without
/// touching the table.
pub async fn replicate(
    State(state): State<Arc<AppState>>,
    Json(op): Json<Operation>,
) -> Result<StatusCode, EngineError> {
    if op.is_refresh() {
        return Ok(StatusCode::OK);
    }
    debug!(op = op.kind.as_str(), key = %op.key, "applying replicated operation");
    state.store.apply(&op)?;
    Ok(StatusCode::OK)
}

/// `GET /api/heartbeat` -- liveness probe, 200 always.
pub async fn heartbeat() -> StatusCode {
    StatusCode::OK
}

/// `GET /api/leader` -- the leader endpoint this peer currently
/// believes in (empty during an interregnum).
pub async fn leader(State(state): State<Arc<AppState>>) -> Json<LeaderInfo> {
    Json(LeaderInfo {
        leader: state.engine.leader().unwrap_or_default(),
    })
}

/// `POST /api/set-leader` -- install a leader announced by an election
/// winner.
pub async fn set_leader(
    State(state): State<Arc<AppState>>,
    Json(info): Json<LeaderInfo>,
) -> StatusCode {
    if !info.leader.is_empty() {
        Arc::clone(&state.engine).adopt_leader(&info.leader);
    }
    StatusCode::OK
}

/// `GET /api/priority` -- this peer's static priority-scheme weight,
/// as a bare JSON number.
pub async fn priority(State(state): State<Arc<AppState>>) -> Json<f64> {
    Json(state.engine.my_priority())
}

/// `GET /api/status` -- liveness snapshot, leader-served.  Followers
/// proxy to the leader so every peer answers with the authoritative
/// view.
pub async fn status(State(state): State<Arc<AppState>>) -> Result<Response, EngineError> {
    let engine = &state.engine;
    if engine.is_leader() {
        return Ok(Json(engine.liveness().snapshot()).into_response());
    }
    let leader = engine.leader().ok_or(EngineError::LeaderUnknown)?;
    let url = format!("http://{leader}/api/status");
    let resp = state
        .forwarder
        .get(&url)
        .send()
        .await
        .map_err(|_| EngineError::PeerUnreachable { endpoint: leader })?;
    Ok(relay_response(resp).await)
}

/// `GET /api/weights` -- Weight Book snapshot, leader-served.
pub async fn weights(State(state): State<Arc<AppState>>) -> Result<Response, EngineError> {
    let engine = &state.engine;
    if engine.is_leader() {
        return Ok(Json(engine.weights().snapshot()).into_response());
    }
    let leader = engine.leader().ok_or(EngineError::LeaderUnknown)?;
    let url = format!("http://{leader}/api/weights");
    let resp = state
        .forwarder
        .get(&url)
        .send()
        .await
        .map_err(|_| EngineError::PeerUnreachable { endpoint: leader })?;
    Ok(relay_response(resp).await)
}

/// `POST /api/notify-consensus` -- a peer announcing itself to the
/// leader.  Marks the sender alive and refreshes the Weight Book to
/// reflect the current alive set.
pub async fn notify_consensus(
    State(state): State<Arc<AppState>>,
    Json(notice): Json<ConsensusNotice>,
) -> Response {
    let engine = &state.engine;
    if !engine.is_leader() {
        return (StatusCode::FORBIDDEN, "not the leader").into_response();
    }
    info!(sender = %notice.sender, "consensus notification received");
    engine.note_peer_alive(&notice.sender);
    engine.refresh_weights();
    StatusCode::OK.into_response()
}

/// `GET /api/mode` -- the process-wide consensus mode.
pub async fn mode(State(state): State<Arc<AppState>>) -> Json<ModeInfo> {
    Json(ModeInfo {
        mode: state.engine.mode().as_str().to_string(),
    })
}
