//! Replication of committed operations to peers.
//!
//! The engine does not apply committed operations remotely itself; it
//! drives a [`Replicator`] capability supplied by the storage layer.
//! Replication is best-effort and fire-and-forget: failures are logged
//! and never roll back the commit.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::consensus::messages::Operation;

/// Delivers a committed operation to one peer.
pub trait Replicator: Send + Sync + 'static {
    /// Apply `op` on the peer at `endpoint`.
    fn replicate(
        &self,
        endpoint: &str,
        op: &Operation,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;
}

/// Replicator posting `/api/replicate` over HTTP.
pub struct HttpReplicator {
    client: reqwest::Client,
}

impl HttpReplicator {
    /// Build a replicator with the given per-request timeout.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Replicator for HttpReplicator {
    fn replicate(
        &self,
        endpoint: &str,
        op: &Operation,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let url = format!("http://{endpoint}/api/replicate");
        let request = self.client.post(url).json(op);
        Box::pin(async move {
            let response = request.send().await?;
            if !response.status().is_success() {
                anyhow::bail!("replication rejected with status {}", response.status());
            }
            Ok(())
        })
    }
}
