//! Server role state: who this peer is, who it believes leads the
//! cluster, and when the leader was last heard from.
//!
//! The leader field doubles as the role: a peer whose leader equals its
//! own endpoint is the leader; everyone else is a follower.  Background
//! loops check the role on every tick and exit on mismatch, so role
//! transitions are just leader-field writes.

use std::sync::RwLock;
use std::time::Instant;

#[derive(Debug, Default)]
struct Inner {
    /// Current leader endpoint; empty while no leader is known.
    leader: String,
    /// Last successful leader heartbeat observed by this peer.
    last_heartbeat: Option<Instant>,
}

/// This peer's view of cluster leadership.
#[derive(Debug)]
pub struct ServerState {
    my_endpoint: String,
    inner: RwLock<Inner>,
}

impl ServerState {
    /// Create the state for `my_endpoint`.  The peer whose endpoint
    /// equals `bootstrap` assumes leadership immediately; all others
    /// start as followers with no known leader.
    pub fn new(my_endpoint: &str, bootstrap: &str) -> Self {
        let leader = if my_endpoint == bootstrap {
            my_endpoint.to_string()
        } else {
            String::new()
        };
        Self {
            my_endpoint: my_endpoint.to_string(),
            inner: RwLock::new(Inner {
                leader,
                last_heartbeat: None,
            }),
        }
    }

    pub fn my_endpoint(&self) -> &str {
        &self.my_endpoint
    }

    /// The current leader endpoint, if any is known.
    pub fn leader(&self) -> Option<String> {
        let inner = self.inner.read().expect("server state lock poisoned");
        if inner.leader.is_empty() {
            None
        } else {
            Some(inner.leader.clone())
        }
    }

    pub fn set_leader(&self, leader: &str) {
        let mut inner = self.inner.write().expect("server state lock poisoned");
        inner.leader = leader.to_string();
    }

    /// Forget the current leader (entering an interregnum).
    pub fn clear_leader(&self) {
        let mut inner = self.inner.write().expect("server state lock poisoned");
        inner.leader.clear();
    }

    pub fn is_leader(&self) -> bool {
        let inner = self.inner.read().expect("server state lock poisoned");
        inner.leader == self.my_endpoint
    }

    pub fn is_follower(&self) -> bool {
        !self.is_leader()
    }

    /// Record a successful leader heartbeat.
    pub fn record_heartbeat(&self) {
        let mut inner = self.inner.write().expect("server state lock poisoned");
        inner.last_heartbeat = Some(Instant::now());
    }

    /// Instant of the last successful leader heartbeat.
    pub fn last_heartbeat(&self) -> Option<Instant> {
        self.inner
            .read()
            .expect("server state lock poisoned")
            .last_heartbeat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_peer_starts_as_leader() {
        let state = ServerState::new("node0:8081", "node0:8081");
        assert!(state.is_leader());
        assert_eq!(state.leader().as_deref(), Some("node0:8081"));
    }

    #[test]
    fn test_other_peers_start_without_a_leader() {
        let state = ServerState::new("node1:8081", "node0:8081");
        assert!(state.is_follower());
        assert_eq!(state.leader(), None);
    }

    #[test]
    fn test_leader_transitions() {
        let state = ServerState::new("node1:8081", "node0:8081");
        state.set_leader("node2:8081");
        assert_eq!(state.leader().as_deref(), Some("node2:8081"));
        assert!(state.is_follower());

        state.set_leader("node1:8081");
        assert!(state.is_leader());

        state.clear_leader();
        assert_eq!(state.leader(), None);
        assert!(state.is_follower());
    }

    #[test]
    fn test_heartbeat_time_is_recorded() {
        let state = ServerState::new("node1:8081", "node0:8081");
        assert!(state.last_heartbeat().is_none());
        state.record_heartbeat();
        assert!(state.last_heartbeat().is_some());
    }
}
