//! CabinetKV library -- replicated key-value store driven by a
//! weighted-quorum consensus engine.
//!
//! This crate provides the core components for running a CabinetKV
//! node: the consensus engine (priority scheme, liveness tracking,
//! weight book, proposals, heartbeats, elections), the SQLite-backed
//! key-value table, and the HTTP surface peers and clients speak.

use std::sync::Arc;

pub mod config;
pub mod consensus;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod replication;
pub mod server;
pub mod store;

use crate::config::Config;
use crate::consensus::ConsensusEngine;
use crate::store::KvStore;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Key-value table.
    pub store: Arc<KvStore>,
    /// Consensus engine (one per process).
    pub engine: Arc<ConsensusEngine>,
    /// Client for forwarding client-facing requests to the leader.
    pub forwarder: reqwest::Client,
}
