//! Static priority scheme for the Cabinet weight model.
//!
//! At construction every peer index is assigned a geometric weight
//! `base * r^i`, reversed so index 0 carries the largest weight.  The
//! ratio `r` is found by a descending search so that the resulting
//! vector satisfies the weighted-majority intersection property: any
//! quorum of `q` peers outweighs any set that could contradict it.
//!
//! The scheme is computed once and never mutated, so it is shared
//! freely across tasks without locking.

/// Starting point for the ratio search.
const RATIO_SEARCH_START: f64 = 2.0;

/// Upper bound on ratio-search decrements before falling back to a
/// uniform scheme.  The search is not proven to terminate for every
/// (n, q) pair, and for n = 1 the inequalities degenerate.
const RATIO_SEARCH_MAX_STEPS: u32 = 10_000;

/// Immutable geometric weight vector for a cluster of `n` peers.
#[derive(Debug, Clone)]
pub struct PriorityScheme {
    /// Descending weights, one per peer index.
    scheme: Vec<f64>,
    /// Half the total scheme weight; the quorum bar before any
    /// responsiveness data exists.
    majority: f64,
    /// The ratio the search settled on (1.0 in uniform mode).
    ratio: f64,
}

impl PriorityScheme {
    /// Build the scheme for `n` peers and quorum size `q`.
    ///
    /// With `cabinet_mode` false the scheme is uniform (`base` for every
    /// index).  Otherwise the ratio search runs with the given `step`.
    pub fn new(n: usize, q: usize, base: f64, step: f64, cabinet_mode: bool) -> Self {
        let ratio = if cabinet_mode {
            search_ratio(n, q, step)
        } else {
            1.0
        };

        let mut scheme: Vec<f64> = (0..n).map(|i| base * ratio.powi(i as i32)).collect();
        scheme.reverse();
        let majority = scheme.iter().sum::<f64>() / 2.0;

        Self {
            scheme,
            majority,
            ratio,
        }
    }

    /// The static weight of the peer at `index`, or 0 for an unknown index.
    pub fn weight(&self, index: usize) -> f64 {
        self.scheme.get(index).copied().unwrap_or(0.0)
    }

    /// The weight of the highest-priority slot (index 0).
    pub fn leader_weight(&self) -> f64 {
        self.weight(0)
    }

    /// Half the total scheme weight, used as the commit bar for the
    /// first proposal.
    pub fn static_majority(&self) -> f64 {
        self.majority
    }

    /// Number of peers the scheme covers.
    pub fn len(&self) -> usize {
        self.scheme.len()
    }

    /// True for an empty cluster (never the case in a running server).
    pub fn is_empty(&self) -> bool {
        self.scheme.is_empty()
    }

    /// The geometric ratio in effect.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }
}

/// Check the weighted-majority intersection property for a candidate
/// ratio: a quorum's worth of top weights must exceed half the total
/// mass, and half the total mass must exceed what a sub-quorum can
/// muster.
fn ratio_satisfies(r: f64, n: usize, q: usize) -> bool {
    let n = n as i32;
    let q = q as i32;
    let half = 0.5 * (r.powi(n) + 1.0);
    r.powi(n - q + 1) > half && half > r.powi(n - q)
}

/// Descending search for the largest ratio satisfying the intersection
/// property, starting at 2.0 and stepping down by `step`.
fn search_ratio(n: usize, q: usize, step: f64) -> f64 {
    let mut r = RATIO_SEARCH_START;
    for _ in 0..RATIO_SEARCH_MAX_STEPS {
        if ratio_satisfies(r, n, q) {
            return r;
        }
        r -= step;
    }
    tracing::warn!(
        n,
        q,
        "ratio search exhausted {} steps, falling back to uniform weights",
        RATIO_SEARCH_MAX_STEPS
    );
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quorum(n: usize) -> usize {
        n / 2 + 1
    }

    #[test]
    fn test_ratio_satisfies_inequalities_for_odd_clusters() {
        for n in [1, 3, 5, 7, 9] {
            let q = quorum(n);
            let scheme = PriorityScheme::new(n, q, 1.0, 0.01, true);
            let r = scheme.ratio();
            assert!(r > 1.0);
            assert!(
                ratio_satisfies(r, n, q),
                "ratio {} fails intersection property for n={} q={}",
                r,
                n,
                q
            );
        }
    }

    #[test]
    fn test_even_clusters_fall_back_to_uniform() {
        // With n even and q = n/2 + 1 the first inequality reduces to
        // -(r^(n/2) - 1)^2 > 0, which no ratio satisfies; the bounded
        // search must fall back instead of spinning forever.
        for n in [2, 4, 6, 8] {
            let scheme = PriorityScheme::new(n, quorum(n), 1.0, 0.01, true);
            assert_eq!(scheme.ratio(), 1.0);
            for i in 0..n {
                assert_eq!(scheme.weight(i), 1.0);
            }
        }
    }

    #[test]
    fn test_scheme_is_descending() {
        let scheme = PriorityScheme::new(5, 3, 1.0, 0.01, true);
        for i in 1..scheme.len() {
            assert!(scheme.weight(i - 1) > scheme.weight(i));
        }
    }

    #[test]
    fn test_leader_holds_largest_weight() {
        let scheme = PriorityScheme::new(5, 3, 1.0, 0.01, true);
        assert_eq!(scheme.leader_weight(), scheme.weight(0));
        assert!(scheme.leader_weight() > scheme.weight(4));
        // Lowest slot always carries the base weight.
        assert!((scheme.weight(4) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_static_majority_is_half_the_total() {
        let scheme = PriorityScheme::new(3, 2, 1.0, 0.01, true);
        let total: f64 = (0..3).map(|i| scheme.weight(i)).sum();
        assert!((scheme.static_majority() - total / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_uniform_mode_yields_flat_weights() {
        let scheme = PriorityScheme::new(5, 3, 1.0, 0.01, false);
        assert_eq!(scheme.ratio(), 1.0);
        for i in 0..5 {
            assert_eq!(scheme.weight(i), 1.0);
        }
        assert!((scheme.static_majority() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_peer_cluster() {
        let scheme = PriorityScheme::new(1, 1, 1.0, 0.01, true);
        assert_eq!(scheme.len(), 1);
        assert_eq!(scheme.weight(0), 1.0);
        assert!((scheme.static_majority() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_index_has_zero_weight() {
        let scheme = PriorityScheme::new(3, 2, 1.0, 0.01, true);
        assert_eq!(scheme.weight(3), 0.0);
        assert_eq!(scheme.weight(100), 0.0);
    }
}
