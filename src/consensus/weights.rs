//! The Weight Book: dynamic, responsiveness-reshaped peer weights and
//! the quorum threshold derived from them.
//!
//! After every successful non-dummy commit the book is rebuilt from the
//! proposal's responder ordering: the fastest responder receives the
//! largest geometric share, alive non-responders a baseline share, and
//! the whole map is normalised so alive weights sum to 1.  Readers see
//! either the old or the new full map, never a partial one, because the
//! map and threshold are replaced together under one write lock.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, warn};

/// Geometric ratio rewarding faster responders.
const RESPONDER_RATIO: f64 = 1.5;

/// Share given to alive peers that did not respond this round.
const BASELINE_WEIGHT: f64 = 1.0;

/// Fraction of alive weight a quorum must carry, and the threshold floor.
const QUORUM_RATIO: f64 = 0.51;

#[derive(Debug, Clone)]
struct BookState {
    weights: HashMap<String, f64>,
    threshold: f64,
}

/// Mutable weight map plus commit threshold, keyed by short id.
#[derive(Debug)]
pub struct WeightBook {
    inner: RwLock<BookState>,
}

impl WeightBook {
    /// Seed the book geometrically from the initial peer order: the
    /// peer at index `i` of `n` receives `1.5^(n-1-i)`.  The given
    /// threshold (the priority scheme's static majority) gates the
    /// first proposal, before any responsiveness data exists; it is
    /// floored at 0.51 so the threshold invariant holds even for
    /// degenerate cluster sizes.
    pub fn seed(short_ids: &[String], initial_threshold: f64) -> Self {
        let n = short_ids.len();
        let weights = short_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                (
                    id.clone(),
                    RESPONDER_RATIO.powi((n - 1 - i) as i32),
                )
            })
            .collect();

        Self {
            inner: RwLock::new(BookState {
                weights,
                threshold: initial_threshold.max(QUORUM_RATIO),
            }),
        }
    }

    /// The current weight of a peer, 0 if absent.
    pub fn weight_of(&self, short_id: &str) -> f64 {
        let state = self.inner.read().expect("weight book lock poisoned");
        state.weights.get(short_id).copied().unwrap_or(0.0)
    }

    /// The minimum approval weight required to commit.
    pub fn threshold(&self) -> f64 {
        self.inner.read().expect("weight book lock poisoned").threshold
    }

    /// Defensive copy of the full weight map.
    pub fn snapshot(&self) -> HashMap<String, f64> {
        let state = self.inner.read().expect("weight book lock poisoned");
        state.weights.clone()
    }

    /// Replace the weight map wholesale with one received from the
    /// leader.  The threshold is untouched; followers inherit it on
    /// their next recompute.
    pub fn merge_from(&self, weights: HashMap<String, f64>) {
        let mut state = self.inner.write().expect("weight book lock poisoned");
        state.weights = weights;
    }

    /// Responsiveness-Weighted Reassignment.
    ///
    /// `responders` is ordered fastest first; `liveness` is a snapshot
    /// of alive flags taken by the caller.  If no alive peer would hold
    /// any weight the update aborts without touching the book.
    pub fn recompute(&self, responders: &[String], liveness: &HashMap<String, bool>) {
        let mut new_weights: HashMap<String, f64> = HashMap::new();

        // Fastest responder gets the largest geometric share.
        let n = responders.len();
        for (i, id) in responders.iter().enumerate() {
            new_weights.insert(id.clone(), RESPONDER_RATIO.powi((n - 1 - i) as i32));
        }

        // Alive peers that did not respond keep a baseline share.
        for (id, alive) in liveness {
            if *alive {
                new_weights.entry(id.clone()).or_insert(BASELINE_WEIGHT);
            }
        }

        let total: f64 = new_weights.values().sum();
        if total > 0.0 {
            for w in new_weights.values_mut() {
                *w /= total;
            }
        }

        let alive_weight: f64 = new_weights
            .iter()
            .filter(|(id, _)| liveness.get(id.as_str()).copied().unwrap_or(false))
            .map(|(_, w)| w)
            .sum();

        if alive_weight == 0.0 {
            warn!("no alive peers hold weight, skipping threshold update to avoid unsafe quorum");
            return;
        }

        let threshold = (QUORUM_RATIO * alive_weight).max(QUORUM_RATIO);

        let mut state = self.inner.write().expect("weight book lock poisoned");
        state.weights = new_weights;
        state.threshold = threshold;
        debug!(alive_weight, threshold, "weight book republished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn all_alive(names: &[&str]) -> HashMap<String, bool> {
        names.iter().map(|s| (s.to_string(), true)).collect()
    }

    #[test]
    fn test_seed_is_geometric_over_initial_order() {
        let book = WeightBook::seed(&ids(&["a", "b", "c"]), 2.6);
        assert_eq!(book.weight_of("a"), 2.25);
        assert_eq!(book.weight_of("b"), 1.5);
        assert_eq!(book.weight_of("c"), 1.0);
        assert_eq!(book.threshold(), 2.6);
        assert_eq!(book.weight_of("unknown"), 0.0);
    }

    #[test]
    fn test_recompute_normalises_alive_weights() {
        let book = WeightBook::seed(&ids(&["a", "b", "c"]), 2.6);
        book.recompute(&ids(&["a", "b"]), &all_alive(&["a", "b", "c"]));

        let total: f64 = book.snapshot().values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_faster_responder_outweighs_slower() {
        let book = WeightBook::seed(&ids(&["a", "b", "c"]), 2.6);
        book.recompute(&ids(&["a", "b", "c"]), &all_alive(&["a", "b", "c"]));
        assert!(book.weight_of("a") > book.weight_of("b"));
        assert!(book.weight_of("b") > book.weight_of("c"));
    }

    #[test]
    fn test_non_responders_keep_a_small_positive_share() {
        let book = WeightBook::seed(&ids(&["a", "b", "c"]), 2.6);
        // c is alive but never responds across three rounds.
        for _ in 0..3 {
            book.recompute(&ids(&["a", "b"]), &all_alive(&["a", "b", "c"]));
        }
        let c = book.weight_of("c");
        assert!(c > 0.0);
        assert!(c < book.weight_of("b"));
    }

    #[test]
    fn test_threshold_floor_holds() {
        let book = WeightBook::seed(&ids(&["a", "b", "c"]), 2.6);
        book.recompute(&ids(&["a"]), &all_alive(&["a"]));
        assert!(book.threshold() >= 0.51);
    }

    #[test]
    fn test_recompute_with_no_alive_weight_aborts() {
        let book = WeightBook::seed(&ids(&["a", "b"]), 1.9);
        let before_weights = book.snapshot();

        let mut liveness = HashMap::new();
        liveness.insert("a".to_string(), false);
        liveness.insert("b".to_string(), false);
        book.recompute(&[], &liveness);

        assert_eq!(book.threshold(), 1.9);
        assert_eq!(book.snapshot(), before_weights);
    }

    #[test]
    fn test_merge_from_replaces_wholesale() {
        let book = WeightBook::seed(&ids(&["a", "b"]), 1.9);
        let mut incoming = HashMap::new();
        incoming.insert("a".to_string(), 0.7);
        incoming.insert("b".to_string(), 0.3);
        book.merge_from(incoming.clone());
        assert_eq!(book.snapshot(), incoming);
        // Threshold is not part of the merge.
        assert_eq!(book.threshold(), 1.9);
    }

    #[test]
    fn test_dead_peers_hold_no_share_of_alive_weight() {
        let book = WeightBook::seed(&ids(&["a", "b", "c"]), 2.6);
        let mut liveness = all_alive(&["a", "b"]);
        liveness.insert("c".to_string(), false);
        book.recompute(&ids(&["a", "b"]), &liveness);

        let alive_total = book.weight_of("a") + book.weight_of("b");
        assert!((alive_total - 1.0).abs() < 1e-9);
        assert_eq!(book.weight_of("c"), 0.0);
    }
}
