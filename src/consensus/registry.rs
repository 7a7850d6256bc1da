//! Ordered registry of cluster peer endpoints.
//!
//! Each peer is addressed three ways: by `host:port` endpoint, by its
//! index in the cluster-wide ordered list (its static priority slot),
//! and by its short id (the host portion), which keys the liveness and
//! weight maps.  The triple is fixed for the process lifetime.

/// Port assumed when an endpoint carries no `:port` suffix.
pub const DEFAULT_PORT: &str = "8081";

/// Immutable ordered list of peer endpoints.
#[derive(Debug, Clone)]
pub struct PeerRegistry {
    endpoints: Vec<String>,
}

impl PeerRegistry {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self { endpoints }
    }

    /// All endpoints in priority order.
    pub fn peers(&self) -> &[String] {
        &self.endpoints
    }

    /// The position of `endpoint` in the ordered list.
    pub fn index_of(&self, endpoint: &str) -> Option<usize> {
        self.endpoints.iter().position(|e| e == endpoint)
    }

    /// Number of peers in the cluster.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// The designated bootstrap endpoint (first entry), which assumes
    /// leadership at startup without an election.
    pub fn bootstrap(&self) -> Option<&str> {
        self.endpoints.first().map(String::as_str)
    }
}

/// The portion of an endpoint before the first colon; the canonical key
/// in the liveness and weight maps.
pub fn short_id(endpoint: &str) -> &str {
    endpoint.split(':').next().unwrap_or(endpoint)
}

/// The portion of an endpoint after the first colon, or [`DEFAULT_PORT`]
/// if absent.
pub fn port(endpoint: &str) -> &str {
    match endpoint.split_once(':') {
        Some((_, p)) => p,
        None => DEFAULT_PORT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PeerRegistry {
        PeerRegistry::new(vec![
            "node0:8081".to_string(),
            "node1:8082".to_string(),
            "node2:8083".to_string(),
        ])
    }

    #[test]
    fn test_index_of_known_and_unknown() {
        let reg = registry();
        assert_eq!(reg.index_of("node0:8081"), Some(0));
        assert_eq!(reg.index_of("node2:8083"), Some(2));
        assert_eq!(reg.index_of("node9:8081"), None);
    }

    #[test]
    fn test_short_id_strips_port() {
        assert_eq!(short_id("node1:8082"), "node1");
        assert_eq!(short_id("bare-host"), "bare-host");
    }

    #[test]
    fn test_port_with_default() {
        assert_eq!(port("node1:8082"), "8082");
        assert_eq!(port("bare-host"), DEFAULT_PORT);
    }

    #[test]
    fn test_bootstrap_is_first_entry() {
        assert_eq!(registry().bootstrap(), Some("node0:8081"));
        assert_eq!(PeerRegistry::new(Vec::new()).bootstrap(), None);
    }
}
