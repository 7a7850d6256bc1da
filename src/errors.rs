//! Engine-facing error types.
//!
//! Every variant maps to a stable error code and an HTTP status.  The
//! enum implements [`axum::response::IntoResponse`] so handlers can
//! simply return `Err(EngineError::NotCommitted)`; the body is a small
//! JSON object `{"error", "message"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Errors surfaced by the consensus engine and its HTTP surface.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Proposal rejected because this peer is not the leader in
    /// leader-only mode.
    #[error("this peer is not the current leader")]
    NotLeader,

    /// Approval weight fell below the quorum threshold; nothing was
    /// changed.
    #[error("approval weight below the quorum threshold")]
    NotCommitted,

    /// A client-facing operation arrived while no leader is known.
    #[error("no leader is currently known to this peer")]
    LeaderUnknown,

    /// A peer could not be reached.  Transient; absorbed into the
    /// failure tracker and never returned to clients by the engine.
    #[error("peer {endpoint} is unreachable")]
    PeerUnreachable { endpoint: String },

    /// Unrecoverable configuration problem at startup.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The storage layer failed after consensus was reached.  Reported,
    /// never rolled back.
    #[error("storage operation failed")]
    StorageFailed(#[from] anyhow::Error),
}

impl EngineError {
    /// Stable error code string for the JSON body.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotLeader => "NotLeader",
            EngineError::NotCommitted => "NotCommitted",
            EngineError::LeaderUnknown => "LeaderUnknown",
            EngineError::PeerUnreachable { .. } => "PeerUnreachable",
            EngineError::ConfigInvalid(_) => "ConfigInvalid",
            EngineError::StorageFailed(_) => "StorageFailed",
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::NotLeader => StatusCode::FORBIDDEN,
            EngineError::NotCommitted => StatusCode::CONFLICT,
            EngineError::LeaderUnknown => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::PeerUnreachable { .. } => StatusCode::BAD_GATEWAY,
            EngineError::ConfigInvalid(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::StorageFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(EngineError::NotLeader.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(EngineError::NotCommitted.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            EngineError::LeaderUnknown.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            EngineError::PeerUnreachable {
                endpoint: "node1:8081".to_string()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_request_id_shape() {
        let id = generate_request_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
