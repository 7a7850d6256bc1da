//! The consensus engine: proposals, heartbeats, and elections.
//!
//! One engine instance per process composes the priority scheme, peer
//! registry, liveness tracker, and weight book, and drives the outbound
//! RPC traffic.  Proposals are serialised through a single async mutex,
//! so locally initiated proposals are totally ordered.  Long-lived
//! background loops (follower monitor, leader broadcast) check the role
//! on every tick and exit cleanly on mismatch; role transitions spawn
//! the replacement loop.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::consensus::liveness::LivenessTracker;
use crate::consensus::messages::{LeaderInfo, Operation};
use crate::consensus::priority::PriorityScheme;
use crate::consensus::registry::{self, PeerRegistry};
use crate::consensus::state::ServerState;
use crate::consensus::weights::WeightBook;
use crate::errors::EngineError;
use crate::metrics::{
    CONSENSUS_ELECTIONS_TOTAL, CONSENSUS_PROPOSALS_TOTAL, CONSENSUS_PROPOSAL_DURATION_SECONDS,
    HEARTBEAT_FAILURES_TOTAL, REPLICATIONS_TOTAL,
};
use crate::replication::Replicator;

/// Consecutive leader-probe failures before a follower declares the
/// leader dead and starts an election.
const MONITOR_FAILURE_THRESHOLD: u32 = 2;

/// Consecutive broadcast-probe failures before the leader marks a
/// follower dead.
const BROADCAST_FAILURE_THRESHOLD: u32 = 3;

/// How long a cabinet++ follower waits for its liveness view to catch
/// up with the leader's before recomputing weights.
const SYNC_WAIT_MAX: Duration = Duration::from_secs(2);
const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Minimum alive peers a synced follower expects before it trusts its
/// own liveness view enough to reshape the weight book.
const SYNC_MIN_ALIVE: usize = 3;

/// Delay between winning an election and issuing the refresh proposal
/// that rebuilds the weight book.
const ELECTION_REFRESH_DELAY: Duration = Duration::from_millis(300);

/// Operating mode of the proposal pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusMode {
    /// Leader-only: proposals may originate only on the leader.
    Cabinet,
    /// Peer-initiated: any peer may drive a proposal directly.
    CabinetPlusPlus,
}

impl ConsensusMode {
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s {
            "cabinet" => Ok(ConsensusMode::Cabinet),
            "cabinet++" => Ok(ConsensusMode::CabinetPlusPlus),
            other => Err(EngineError::ConfigInvalid(format!(
                "unknown consensus mode '{other}' (expected 'cabinet' or 'cabinet++')"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusMode::Cabinet => "cabinet",
            ConsensusMode::CabinetPlusPlus => "cabinet++",
        }
    }
}

impl fmt::Display for ConsensusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A peer that approved the current proposal, with its measured RTT.
#[derive(Debug, Clone)]
struct Responder {
    short_id: String,
    rtt: Duration,
}

/// Whether a tallied approval weight clears the commit bar.  The
/// decision depends only on the set of approvers and their weights,
/// never on arrival order.
fn quorum_met(approval_weight: f64, threshold: f64) -> bool {
    approval_weight >= threshold
}

/// Weighted-quorum consensus engine; one per process.
pub struct ConsensusEngine {
    mode: ConsensusMode,
    registry: PeerRegistry,
    scheme: PriorityScheme,
    state: ServerState,
    liveness: LivenessTracker,
    weights: WeightBook,
    replicator: Arc<dyn Replicator>,
    /// Client for intra-consensus RPCs; bounded per-request timeout.
    client: reqwest::Client,
    /// Single-proposer critical section.
    proposal_lock: tokio::sync::Mutex<()>,
    heartbeat_interval: Duration,
}

impl ConsensusEngine {
    /// Build the engine for `my_endpoint` over the given cluster.
    ///
    /// The peer whose endpoint matches the registry's bootstrap entry
    /// assumes leadership immediately; call [`start`](Self::start) to
    /// launch the matching background loop.
    pub fn new(
        my_endpoint: &str,
        registry: PeerRegistry,
        mode: ConsensusMode,
        replicator: Arc<dyn Replicator>,
        heartbeat_interval: Duration,
        rpc_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let bootstrap = registry
            .bootstrap()
            .ok_or_else(|| anyhow::anyhow!("cluster configuration lists no peers"))?
            .to_string();
        if registry.index_of(my_endpoint).is_none() {
            anyhow::bail!("own endpoint {my_endpoint} is not in the cluster list");
        }

        let n = registry.len();
        let q = n / 2 + 1;
        let scheme = PriorityScheme::new(n, q, 1.0, 0.01, true);

        let short_ids: Vec<String> = registry
            .peers()
            .iter()
            .map(|p| registry::short_id(p).to_string())
            .collect();
        let weights = WeightBook::seed(&short_ids, scheme.static_majority());

        let client = reqwest::Client::builder().timeout(rpc_timeout).build()?;

        Ok(Self {
            mode,
            scheme,
            state: ServerState::new(my_endpoint, &bootstrap),
            registry,
            liveness: LivenessTracker::new(),
            weights,
            replicator,
            client,
            proposal_lock: tokio::sync::Mutex::new(()),
            heartbeat_interval,
        })
    }

    /// Launch the background loop matching this peer's starting role.
    pub fn start(self: Arc<Self>) {
        if self.state.is_leader() {
            info!(endpoint = self.state.my_endpoint(), "starting as bootstrap leader");
            self.spawn_broadcast();
        } else {
            info!(endpoint = self.state.my_endpoint(), "starting as follower");
            self.spawn_monitor();
        }
    }

    // -- Accessors -----------------------------------------------------------

    pub fn mode(&self) -> ConsensusMode {
        self.mode
    }

    pub fn my_endpoint(&self) -> &str {
        self.state.my_endpoint()
    }

    pub fn is_leader(&self) -> bool {
        self.state.is_leader()
    }

    /// The current leader endpoint, if one is known.
    pub fn leader(&self) -> Option<String> {
        self.state.leader()
    }

    /// This peer's static priority-scheme weight.
    pub fn my_priority(&self) -> f64 {
        match self.registry.index_of(self.state.my_endpoint()) {
            Some(index) => self.scheme.weight(index),
            None => 0.0,
        }
    }

    pub fn liveness(&self) -> &LivenessTracker {
        &self.liveness
    }

    pub fn weights(&self) -> &WeightBook {
        &self.weights
    }

    // -- Proposal pipeline ---------------------------------------------------

    /// Drive one operation through the weighted-quorum protocol.
    ///
    /// The vote tally uses priority-scheme weights throughout, including
    /// the proposer's own vote.  All in-flight approvals are awaited
    /// before the decision so the RTT ordering feeding the weight book
    /// is complete.
    pub async fn propose(&self, op: Operation) -> Result<(), EngineError> {
        let _guard = self.proposal_lock.lock().await;

        if self.mode == ConsensusMode::Cabinet && !self.state.is_leader() {
            return Err(EngineError::NotLeader);
        }

        let started = Instant::now();
        debug!(op = op.kind.as_str(), key = %op.key, "initiating proposal");

        let my_short = registry::short_id(self.state.my_endpoint()).to_string();
        let mut approval_weight = 0.0;
        let mut responders: Vec<Responder> = Vec::new();

        if self.liveness.is_alive(&my_short) {
            approval_weight += self.my_priority();
            responders.push(Responder {
                short_id: my_short,
                rtt: Duration::ZERO,
            });
        }

        let mut requests = JoinSet::new();
        for (index, peer) in self.registry.peers().iter().enumerate() {
            if peer == self.state.my_endpoint() {
                continue;
            }
            let sid = registry::short_id(peer).to_string();
            if !self.liveness.is_alive(&sid) {
                debug!(peer = %peer, "skipping dead peer during proposal");
                continue;
            }
            let weight = self.scheme.weight(index);
            let client = self.client.clone();
            let url = format!("http://{peer}/api/approve");
            let body = op.clone();
            requests.spawn(async move {
                let sent = Instant::now();
                let approved = match client.post(&url).json(&body).send().await {
                    Ok(resp) => resp.status().is_success(),
                    Err(err) => {
                        debug!(url = %url, error = %err, "approval request failed");
                        false
                    }
                };
                approved.then(|| (sid, sent.elapsed(), weight))
            });
        }

        while let Some(joined) = requests.join_next().await {
            if let Ok(Some((sid, rtt, weight))) = joined {
                debug!(peer = %sid, weight, rtt_ms = rtt.as_millis() as u64, "approval granted");
                approval_weight += weight;
                responders.push(Responder { short_id: sid, rtt });
            }
        }

        let threshold = self.weights.threshold();
        if !quorum_met(approval_weight, threshold) {
            info!(
                key = %op.key,
                approval_weight,
                threshold,
                "quorum not reached, rejecting proposal"
            );
            counter!(CONSENSUS_PROPOSALS_TOTAL, "mode" => self.mode.as_str(), "outcome" => "rejected")
                .increment(1);
            return Err(EngineError::NotCommitted);
        }

        info!(
            op = op.kind.as_str(),
            key = %op.key,
            approval_weight,
            threshold,
            "quorum reached, committing"
        );
        self.replicate_committed(&op);

        if !op.is_refresh() {
            if self.mode == ConsensusMode::CabinetPlusPlus && self.state.is_follower() {
                // A partitioned follower must not install a weight book
                // derived from only the subset of peers it can see.
                if let Some(leader) = self.state.leader() {
                    self.sync_from_leader(&leader).await;
                    self.wait_for_synced_liveness().await;
                }
            }
            responders.sort_by_key(|r| r.rtt);
            let ordered: Vec<String> = responders.into_iter().map(|r| r.short_id).collect();
            self.weights.recompute(&ordered, &self.liveness.snapshot());
        }

        counter!(CONSENSUS_PROPOSALS_TOTAL, "mode" => self.mode.as_str(), "outcome" => "committed")
            .increment(1);
        histogram!(CONSENSUS_PROPOSAL_DURATION_SECONDS, "mode" => self.mode.as_str())
            .record(started.elapsed().as_secs_f64());
        Ok(())
    }

    /// Fan committed operations out to every live peer, best-effort.
    /// Refresh operations are consensus-only and never replicated.
    fn replicate_committed(&self, op: &Operation) {
        if op.is_refresh() {
            return;
        }
        for peer in self.registry.peers() {
            if peer == self.state.my_endpoint() {
                continue;
            }
            if !self.liveness.is_alive(registry::short_id(peer)) {
                continue;
            }
            let replicator = Arc::clone(&self.replicator);
            let endpoint = peer.clone();
            let body = op.clone();
            tokio::spawn(async move {
                match replicator.replicate(&endpoint, &body).await {
                    Ok(()) => {
                        counter!(REPLICATIONS_TOTAL, "outcome" => "ok").increment(1);
                        debug!(peer = %endpoint, "operation replicated");
                    }
                    Err(err) => {
                        counter!(REPLICATIONS_TOTAL, "outcome" => "error").increment(1);
                        warn!(peer = %endpoint, error = %err, "replication failed");
                    }
                }
            });
        }
    }

    /// Pull the leader's liveness and weight views (follower-side sync
    /// before a cabinet++ recompute).
    async fn sync_from_leader(&self, leader: &str) {
        let url = format!("http://{leader}/api/status");
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<HashMap<String, bool>>().await {
                    Ok(status) => self.liveness.merge_from(&status),
                    Err(err) => debug!(error = %err, "malformed status snapshot from leader"),
                }
            }
            Ok(resp) => debug!(status = %resp.status(), "leader refused status snapshot"),
            Err(err) => debug!(error = %err, "could not fetch status snapshot from leader"),
        }

        let url = format!("http://{leader}/api/weights");
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<HashMap<String, f64>>().await {
                    Ok(weights) => self.weights.merge_from(weights),
                    Err(err) => debug!(error = %err, "malformed weight snapshot from leader"),
                }
            }
            Ok(resp) => debug!(status = %resp.status(), "leader refused weight snapshot"),
            Err(err) => debug!(error = %err, "could not fetch weight snapshot from leader"),
        }
    }

    async fn wait_for_synced_liveness(&self) {
        let deadline = Instant::now() + SYNC_WAIT_MAX;
        while self.liveness.alive_count() < SYNC_MIN_ALIVE {
            if Instant::now() >= deadline {
                warn!(
                    alive = self.liveness.alive_count(),
                    "liveness view still thin after sync wait, proceeding anyway"
                );
                return;
            }
            tokio::time::sleep(SYNC_POLL_INTERVAL).await;
        }
    }

    // -- Inbound notifications -----------------------------------------------

    /// Install a leader reported over `/api/set-leader`.  Role changes
    /// spawn the loop for the new role; the loop for the old role exits
    /// on its next tick.
    pub fn adopt_leader(self: Arc<Self>, leader: &str) {
        let was_leader = self.state.is_leader();
        self.state.set_leader(leader);
        info!(leader = %leader, "leader updated");
        if was_leader && self.state.is_follower() {
            self.spawn_monitor();
        } else if !was_leader && self.state.is_leader() {
            self.spawn_broadcast();
        }
    }

    /// Leader-side handling of `/api/notify-consensus`: the sender is
    /// alive, and the weight book should reflect the current alive set.
    pub fn note_peer_alive(&self, short_id: &str) {
        self.liveness.mark_alive(short_id);
    }

    /// Rebuild the weight book from the current alive set in registry
    /// order.  The next committed proposal re-ranks peers by RTT.
    pub fn refresh_weights(&self) {
        let snapshot = self.liveness.snapshot();
        let ordered: Vec<String> = self
            .registry
            .peers()
            .iter()
            .map(|p| registry::short_id(p).to_string())
            .filter(|sid| snapshot.get(sid).copied().unwrap_or(false))
            .collect();
        self.weights.recompute(&ordered, &snapshot);
    }

    // -- Background loops ----------------------------------------------------

    fn spawn_monitor(self: Arc<Self>) {
        tokio::spawn(async move { self.run_monitor().await });
    }

    fn spawn_broadcast(self: Arc<Self>) {
        tokio::spawn(async move { self.run_broadcast().await });
    }

    fn spawn_election(self: Arc<Self>) {
        tokio::spawn(async move { self.run_election().await });
    }

    /// Follower loop: probe the leader every tick, adopt a discovered
    /// leader when none is known, and trigger an election once the
    /// leader has missed its allowance of heartbeats.
    async fn run_monitor(self: Arc<Self>) {
        info!("leader monitor started");
        let mut ticker = tokio::time::interval(self.heartbeat_interval);
        loop {
            ticker.tick().await;
            if !self.state.is_follower() {
                info!("no longer a follower, stopping leader monitor");
                return;
            }

            let leader = match self.state.leader() {
                Some(leader) => leader,
                None => match self.discover_leader().await {
                    Some(leader) => leader,
                    None => {
                        debug!("could not determine a leader this tick");
                        continue;
                    }
                },
            };

            let sid = registry::short_id(&leader).to_string();
            if self.probe_heartbeat(&leader).await {
                self.state.record_heartbeat();
                self.liveness.mark_alive(&sid);
                continue;
            }

            counter!(HEARTBEAT_FAILURES_TOTAL, "peer" => sid.clone()).increment(1);
            let failures = self.liveness.record_failure(&sid, MONITOR_FAILURE_THRESHOLD);
            if failures >= MONITOR_FAILURE_THRESHOLD {
                warn!(leader = %leader, failures, "leader unresponsive, starting election");
                self.state.clear_leader();
                self.spawn_election();
                return;
            }
            debug!(leader = %leader, failures, "leader heartbeat failed");
        }
    }

    /// Leader loop: refresh own liveness and probe every follower in
    /// parallel each tick.
    async fn run_broadcast(self: Arc<Self>) {
        info!("heartbeat broadcast started");
        let mut ticker = tokio::time::interval(self.heartbeat_interval);
        loop {
            ticker.tick().await;
            if !self.state.is_leader() {
                info!("no longer leader, stopping heartbeat broadcast");
                return;
            }

            self.liveness
                .mark_alive(registry::short_id(self.state.my_endpoint()));

            let mut probes = JoinSet::new();
            for peer in self.registry.peers() {
                if peer == self.state.my_endpoint() {
                    continue;
                }
                let client = self.client.clone();
                let endpoint = peer.clone();
                probes.spawn(async move {
                    let url = format!("http://{endpoint}/api/heartbeat");
                    let ok = matches!(
                        client.get(&url).send().await,
                        Ok(resp) if resp.status().is_success()
                    );
                    (endpoint, ok)
                });
            }

            while let Some(joined) = probes.join_next().await {
                let Ok((endpoint, ok)) = joined else { continue };
                let sid = registry::short_id(&endpoint);
                if ok {
                    self.liveness.mark_alive(sid);
                } else {
                    counter!(HEARTBEAT_FAILURES_TOTAL, "peer" => sid.to_string()).increment(1);
                    let failures = self
                        .liveness
                        .record_failure(sid, BROADCAST_FAILURE_THRESHOLD);
                    debug!(peer = %endpoint, failures, "follower heartbeat failed");
                }
            }
        }
    }

    /// Ask peers for a reported leader, adopting the first one whose
    /// heartbeat checks out.
    async fn discover_leader(&self) -> Option<String> {
        for peer in self.registry.peers() {
            if peer == self.state.my_endpoint() {
                continue;
            }
            let url = format!("http://{peer}/api/leader");
            let Ok(resp) = self.client.get(&url).send().await else {
                continue;
            };
            if !resp.status().is_success() {
                continue;
            }
            let Ok(info) = resp.json::<LeaderInfo>().await else {
                continue;
            };
            if info.leader.is_empty() {
                continue;
            }
            if self.probe_heartbeat(&info.leader).await {
                info!(leader = %info.leader, via = %peer, "learned and verified leader");
                self.state.set_leader(&info.leader);
                return Some(info.leader);
            }
            debug!(reported = %info.leader, via = %peer, "ignoring stale leader report");
        }
        None
    }

    async fn probe_heartbeat(&self, endpoint: &str) -> bool {
        let url = format!("http://{endpoint}/api/heartbeat");
        matches!(
            self.client.get(&url).send().await,
            Ok(resp) if resp.status().is_success()
        )
    }

    /// Election driver.  Candidacy survives ties (only a strictly
    /// greater priority disqualifies); a live leader discovered during
    /// the re-check aborts the election.
    async fn run_election(self: Arc<Self>) {
        info!("starting election");
        let my_priority = self.my_priority();
        let mut candidate = true;

        for peer in self.registry.peers() {
            if peer == self.state.my_endpoint() {
                continue;
            }
            let url = format!("http://{peer}/api/priority");
            let Ok(resp) = self.client.get(&url).send().await else {
                continue;
            };
            if !resp.status().is_success() {
                continue;
            }
            let Ok(weight) = resp.json::<f64>().await else {
                continue;
            };
            if weight > my_priority {
                debug!(peer = %peer, weight, my_priority, "outranked, abandoning candidacy");
                candidate = false;
                break;
            }
        }

        // Someone may have won while we were polling priorities.
        for peer in self.registry.peers() {
            if peer == self.state.my_endpoint() {
                continue;
            }
            let url = format!("http://{peer}/api/leader");
            let Ok(resp) = self.client.get(&url).send().await else {
                continue;
            };
            if !resp.status().is_success() {
                continue;
            }
            let Ok(info) = resp.json::<LeaderInfo>().await else {
                continue;
            };
            if info.leader.is_empty() || info.leader == self.state.my_endpoint() {
                continue;
            }
            if self.probe_heartbeat(&info.leader).await {
                info!(leader = %info.leader, "election aborted, a live leader is already declared");
                counter!(CONSENSUS_ELECTIONS_TOTAL, "outcome" => "aborted").increment(1);
                self.state.set_leader(&info.leader);
                self.spawn_monitor();
                return;
            }
            debug!(reported = %info.leader, "declared leader is unreachable, continuing election");
        }

        if !candidate {
            info!("lost the election, resuming leader monitor");
            counter!(CONSENSUS_ELECTIONS_TOTAL, "outcome" => "lost").increment(1);
            self.spawn_monitor();
            return;
        }

        let me = self.state.my_endpoint().to_string();
        info!(leader = %me, "won the election, assuming leadership");
        counter!(CONSENSUS_ELECTIONS_TOTAL, "outcome" => "won").increment(1);
        self.state.set_leader(&me);
        Arc::clone(&self).spawn_broadcast();

        for peer in self.registry.peers() {
            if *peer == me {
                continue;
            }
            let client = self.client.clone();
            let url = format!("http://{peer}/api/set-leader");
            let body = LeaderInfo { leader: me.clone() };
            tokio::spawn(async move {
                if let Err(err) = client.post(&url).json(&body).send().await {
                    warn!(url = %url, error = %err, "failed to announce new leader");
                }
            });
        }

        // Rebuild the weight book once followers have had a moment to
        // adopt the new leader.
        let engine = Arc::clone(&self);
        tokio::spawn(async move {
            tokio::time::sleep(ELECTION_REFRESH_DELAY).await;
            info!("issuing refresh proposal to rebuild the weight book");
            if let Err(err) = engine.propose(Operation::refresh()).await {
                warn!(error = %err, "post-election refresh proposal failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;

    struct NoopReplicator;

    impl Replicator for NoopReplicator {
        fn replicate(
            &self,
            _endpoint: &str,
            _op: &Operation,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn engine(endpoints: &[&str], mine: &str, mode: ConsensusMode) -> Arc<ConsensusEngine> {
        let registry = PeerRegistry::new(endpoints.iter().map(|s| s.to_string()).collect());
        Arc::new(
            ConsensusEngine::new(
                mine,
                registry,
                mode,
                Arc::new(NoopReplicator),
                Duration::from_millis(500),
                Duration::from_secs(1),
            )
            .expect("engine construction failed"),
        )
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            ConsensusMode::parse("cabinet").unwrap(),
            ConsensusMode::Cabinet
        );
        assert_eq!(
            ConsensusMode::parse("cabinet++").unwrap(),
            ConsensusMode::CabinetPlusPlus
        );
        assert!(ConsensusMode::parse("raft").is_err());
    }

    #[test]
    fn test_bootstrap_peer_leads_others_follow() {
        let leader = engine(
            &["node0:8081", "node1:8081", "node2:8081"],
            "node0:8081",
            ConsensusMode::Cabinet,
        );
        assert!(leader.is_leader());
        assert_eq!(leader.leader().as_deref(), Some("node0:8081"));

        let follower = engine(
            &["node0:8081", "node1:8081", "node2:8081"],
            "node1:8081",
            ConsensusMode::Cabinet,
        );
        assert!(!follower.is_leader());
        assert_eq!(follower.leader(), None);
    }

    #[test]
    fn test_my_priority_follows_the_scheme() {
        let e0 = engine(
            &["node0:8081", "node1:8081", "node2:8081"],
            "node0:8081",
            ConsensusMode::Cabinet,
        );
        let e2 = engine(
            &["node0:8081", "node1:8081", "node2:8081"],
            "node2:8081",
            ConsensusMode::Cabinet,
        );
        assert_eq!(e0.my_priority(), e0.scheme.leader_weight());
        assert!(e0.my_priority() > e2.my_priority());
        assert!((e2.my_priority() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_quorum_decision_is_order_independent() {
        let weights = [0.2, 0.2, 0.2];
        let forward: f64 = weights.iter().sum();
        let reverse: f64 = weights.iter().rev().sum();
        assert_eq!(quorum_met(forward, 0.51), quorum_met(reverse, 0.51));
        assert!(quorum_met(forward, 0.51));
        assert!(!quorum_met(0.2 + 0.2, 0.51));
    }

    #[tokio::test]
    async fn test_non_leader_cannot_propose_in_cabinet_mode() {
        let follower = engine(
            &["node0:8081", "node1:8081"],
            "node1:8081",
            ConsensusMode::Cabinet,
        );
        let err = follower
            .propose(Operation::put("foo", "bar"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotLeader));
    }

    #[tokio::test]
    async fn test_single_peer_cluster_commits_and_reshapes_weights() {
        let e = engine(&["node0:8081"], "node0:8081", ConsensusMode::Cabinet);
        e.liveness.mark_alive("node0");

        e.propose(Operation::put("foo", "bar")).await.unwrap();

        // Sole responder holds the full normalised weight and the
        // threshold has settled on its floor.
        assert!((e.weights.weight_of("node0") - 1.0).abs() < 1e-9);
        assert!((e.weights.threshold() - 0.51).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_refresh_proposal_commits_without_touching_the_book() {
        let e = engine(&["node0:8081"], "node0:8081", ConsensusMode::Cabinet);
        e.liveness.mark_alive("node0");

        let weights_before = e.weights.snapshot();
        let threshold_before = e.weights.threshold();

        e.propose(Operation::refresh()).await.unwrap();

        assert_eq!(e.weights.snapshot(), weights_before);
        assert_eq!(e.weights.threshold(), threshold_before);
    }

    #[tokio::test]
    async fn test_lone_leader_misses_the_static_majority() {
        let e = engine(
            &["node0:8081", "node1:8081", "node2:8081"],
            "node0:8081",
            ConsensusMode::Cabinet,
        );
        // Only the proposer is alive; node1 and node2 are unknown and
        // therefore skipped without any network traffic.
        e.liveness.mark_alive("node0");

        let weights_before = e.weights.snapshot();
        let err = e.propose(Operation::put("foo", "bar")).await.unwrap_err();
        assert!(matches!(err, EngineError::NotCommitted));

        // A failed proposal changes nothing.
        assert_eq!(e.weights.snapshot(), weights_before);
        assert_eq!(e.weights.threshold(), e.scheme.static_majority());
    }

    #[tokio::test]
    async fn test_adopt_leader_demotes_and_promotes() {
        let e = engine(
            &["node0:8081", "node1:8081"],
            "node0:8081",
            ConsensusMode::Cabinet,
        );
        assert!(e.is_leader());

        Arc::clone(&e).adopt_leader("node1:8081");
        assert!(!e.is_leader());
        assert_eq!(e.leader().as_deref(), Some("node1:8081"));

        Arc::clone(&e).adopt_leader("node0:8081");
        assert!(e.is_leader());
    }
}
