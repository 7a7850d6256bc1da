//! Weighted-quorum consensus (Cabinet / Cabinet++).
//!
//! Component layering, leaves first: the [`priority`] scheme computes
//! the static geometric weight vector; the [`registry`] maps endpoints
//! to indices and short ids; the [`liveness`] tracker maintains
//! alive/dead state; the [`weights`] book owns the dynamic weight map
//! and quorum threshold; and the [`engine`] composes all four with the
//! storage layer's replicator to drive proposals, heartbeats, and
//! elections.

pub mod engine;
pub mod liveness;
pub mod messages;
pub mod priority;
pub mod registry;
pub mod state;
pub mod weights;

pub use engine::{ConsensusEngine, ConsensusMode};
pub use messages::{Operation, DUMMY_KEY_PREFIX};
