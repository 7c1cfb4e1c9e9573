//! Error types for ring mutations and lookups.

use memring_types::NodeAddr;

/// Errors produced by the placement ring.
///
/// Every failing mutation is rejected before the ring is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    /// Two virtual nodes hashed to the same ring position.
    #[error("ring position {position} of {incoming} collides with {existing}")]
    PositionCollision {
        /// The contested position.
        position: u32,
        /// The node already holding the position.
        existing: NodeAddr,
        /// The node being inserted.
        incoming: NodeAddr,
    },

    /// Lookup on a ring with no virtual nodes.
    #[error("ring is empty")]
    EmptyRing,

    /// The node has no positions on the ring.
    #[error("unknown node: {0}")]
    UnknownNode(NodeAddr),

    /// The node already has positions on the ring.
    #[error("node already on the ring: {0}")]
    AlreadyPresent(NodeAddr),

    /// A ring configured with zero virtual nodes per physical node.
    #[error("vnodes per node must be at least 1")]
    InvalidVnodeCount,
}
