//! Configuration loading and types for CabinetKV.
//!
//! Two files configure a node.  The YAML server configuration is
//! deserialized into [`Config`]; each subsection governs one part of
//! the system (consensus timing, storage, logging, observability).
//! The cluster membership file is plain text, one peer per line,
//! whitespace-separated `<id> <host> <port>`; the `SERVER_ID`
//! environment variable selects this process's row.

use serde::Deserialize;
use std::path::Path;

use crate::errors::EngineError;

/// Environment variable naming this process's cluster row.
pub const SERVER_ID_ENV: &str = "SERVER_ID";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Consensus engine settings.
    #[serde(default)]
    pub consensus: ConsensusConfig,

    /// Key-value storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings (metrics + health probes).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Consensus engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusConfig {
    /// Consensus mode: `cabinet` (leader-only) or `cabinet++`
    /// (peer-initiated).
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Path to the cluster membership file.
    #[serde(default = "default_cluster_file")]
    pub cluster_file: String,

    /// Heartbeat tick interval in milliseconds.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Per-request timeout for intra-consensus RPCs in milliseconds.
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            cluster_file: default_cluster_file(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
        }
    }
}

/// Key-value storage configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// SQLite-specific configuration.
    #[serde(default)]
    pub sqlite: SqliteConfig,
}

/// SQLite-specific storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_sqlite_path")]
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_sqlite_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and the `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,

    /// Enable the `/health` probe.
    #[serde(default = "default_true")]
    pub health_check: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics: true,
            health_check: true,
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_mode() -> String {
    "cabinet".to_string()
}

fn default_cluster_file() -> String {
    "./cluster.conf".to_string()
}

fn default_heartbeat_interval_ms() -> u64 {
    500
}

fn default_rpc_timeout_ms() -> u64 {
    1_000
}

fn default_sqlite_path() -> String {
    "./data/kvstore.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loaders -----------------------------------------------------------------

/// Load and parse the YAML server configuration at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, EngineError> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        EngineError::ConfigInvalid(format!(
            "cannot read {}: {e}",
            path.as_ref().display()
        ))
    })?;
    serde_yaml::from_str(&contents)
        .map_err(|e| EngineError::ConfigInvalid(format!("malformed configuration: {e}")))
}

/// One row of the cluster membership file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRow {
    /// Priority slot of this peer (cluster-wide index).
    pub id: usize,
    pub host: String,
    pub port: String,
}

impl PeerRow {
    /// The `host:port` endpoint this row describes.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse the cluster membership file: one peer per line,
/// whitespace-separated `<id> <host> <port>`.  Lines with any other
/// field count are silently ignored.  Rows are returned ordered by id.
pub fn load_cluster<P: AsRef<Path>>(path: P) -> Result<Vec<PeerRow>, EngineError> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        EngineError::ConfigInvalid(format!(
            "cannot read cluster file {}: {e}",
            path.as_ref().display()
        ))
    })?;
    Ok(parse_cluster(&contents))
}

fn parse_cluster(contents: &str) -> Vec<PeerRow> {
    let mut rows: Vec<PeerRow> = contents
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 3 {
                return None;
            }
            let id = fields[0].parse().ok()?;
            Some(PeerRow {
                id,
                host: fields[1].to_string(),
                port: fields[2].to_string(),
            })
        })
        .collect();
    rows.sort_by_key(|row| row.id);
    rows
}

/// Resolve this process's row index from the `SERVER_ID` environment
/// variable (default 0) and check it against the cluster size.
pub fn resolve_server_id(cluster_len: usize) -> Result<usize, EngineError> {
    let id = match std::env::var(SERVER_ID_ENV) {
        Ok(raw) => raw.parse::<usize>().map_err(|_| {
            EngineError::ConfigInvalid(format!("{SERVER_ID_ENV} is not a number: {raw}"))
        })?,
        Err(_) => 0,
    };
    if id >= cluster_len {
        return Err(EngineError::ConfigInvalid(format!(
            "{SERVER_ID_ENV} {id} is out of range for a cluster of {cluster_len}"
        )));
    }
    Ok(id)
}
