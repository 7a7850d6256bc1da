//! Per-peer liveness tracking.
//!
//! Peers start unknown and become alive only when a heartbeat (inbound
//! or outbound) succeeds.  Consecutive failures accumulate until they
//! cross a caller-supplied threshold, at which point the peer is marked
//! dead.  The threshold is an argument because it is component-specific:
//! the follower monitor gives the leader 2 strikes, the leader broadcast
//! gives followers 3.
//!
//! All mutations go through a single readers-writer lock, so state
//! changes for any one peer are totally ordered.

use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct PeerHealth {
    alive: bool,
    failures: u32,
}

/// Alive/dead state and consecutive-failure counters, keyed by short id.
#[derive(Debug, Default)]
pub struct LivenessTracker {
    inner: RwLock<HashMap<String, PeerHealth>>,
}

impl LivenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful contact: alive, failure counter reset.
    pub fn mark_alive(&self, short_id: &str) {
        let mut map = self.inner.write().expect("liveness lock poisoned");
        let entry = map.entry(short_id.to_string()).or_default();
        entry.alive = true;
        entry.failures = 0;
    }

    /// Record a failed contact and return the new consecutive-failure
    /// count.  The peer is marked dead once the count reaches
    /// `threshold`.
    pub fn record_failure(&self, short_id: &str, threshold: u32) -> u32 {
        let mut map = self.inner.write().expect("liveness lock poisoned");
        let entry = map.entry(short_id.to_string()).or_default();
        entry.failures += 1;
        if entry.failures >= threshold {
            entry.alive = false;
        }
        entry.failures
    }

    /// Whether the peer is currently considered alive.  Unknown peers
    /// are not alive.
    pub fn is_alive(&self, short_id: &str) -> bool {
        let map = self.inner.read().expect("liveness lock poisoned");
        map.get(short_id).map(|h| h.alive).unwrap_or(false)
    }

    /// Point-in-time copy of the alive flags.
    pub fn snapshot(&self) -> HashMap<String, bool> {
        let map = self.inner.read().expect("liveness lock poisoned");
        map.iter().map(|(k, v)| (k.clone(), v.alive)).collect()
    }

    /// Overwrite alive flags with values from an authoritative peer.
    ///
    /// A peer merged as alive has its failure counter reset, keeping the
    /// reset-on-success invariant; a peer merged as dead keeps its
    /// counter.
    pub fn merge_from(&self, status: &HashMap<String, bool>) {
        let mut map = self.inner.write().expect("liveness lock poisoned");
        for (id, alive) in status {
            let entry = map.entry(id.clone()).or_default();
            entry.alive = *alive;
            if *alive {
                entry.failures = 0;
            }
        }
    }

    /// Number of peers currently marked alive.
    pub fn alive_count(&self) -> usize {
        let map = self.inner.read().expect("liveness lock poisoned");
        map.values().filter(|h| h.alive).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_peer_is_not_alive() {
        let tracker = LivenessTracker::new();
        assert!(!tracker.is_alive("node0"));
        assert_eq!(tracker.alive_count(), 0);
    }

    #[test]
    fn test_mark_alive_resets_failures() {
        let tracker = LivenessTracker::new();
        tracker.record_failure("node0", 3);
        tracker.record_failure("node0", 3);
        tracker.mark_alive("node0");
        assert!(tracker.is_alive("node0"));
        // The next failure starts counting from zero again.
        assert_eq!(tracker.record_failure("node0", 3), 1);
        assert!(tracker.is_alive("node0"));
    }

    #[test]
    fn test_failure_threshold_marks_dead() {
        let tracker = LivenessTracker::new();
        tracker.mark_alive("leader");
        assert_eq!(tracker.record_failure("leader", 2), 1);
        assert!(tracker.is_alive("leader"));
        assert_eq!(tracker.record_failure("leader", 2), 2);
        assert!(!tracker.is_alive("leader"));
    }

    #[test]
    fn test_failures_are_monotone_without_success() {
        let tracker = LivenessTracker::new();
        let mut last = 0;
        for _ in 0..5 {
            let count = tracker.record_failure("node1", 3);
            assert!(count > last);
            last = count;
        }
    }

    #[test]
    fn test_snapshot_is_a_defensive_copy() {
        let tracker = LivenessTracker::new();
        tracker.mark_alive("node0");
        let snap = tracker.snapshot();
        tracker.record_failure("node0", 1);
        // The snapshot still shows the state at copy time.
        assert_eq!(snap.get("node0"), Some(&true));
        assert!(!tracker.is_alive("node0"));
    }

    #[test]
    fn test_merge_from_overwrites_and_is_idempotent() {
        let tracker = LivenessTracker::new();
        tracker.record_failure("node0", 2);
        tracker.record_failure("node0", 2);

        let mut status = HashMap::new();
        status.insert("node0".to_string(), true);
        status.insert("node1".to_string(), false);

        tracker.merge_from(&status);
        let first = tracker.snapshot();
        tracker.merge_from(&status);
        let second = tracker.snapshot();

        assert_eq!(first, second);
        assert!(tracker.is_alive("node0"));
        assert!(!tracker.is_alive("node1"));
        // Merged-alive peers never sit at their failure threshold.
        assert_eq!(tracker.record_failure("node0", 2), 1);
        assert!(tracker.is_alive("node0"));
    }
}
