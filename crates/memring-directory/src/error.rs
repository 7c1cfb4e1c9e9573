//! Error types for the directory.

use std::fmt;

use memring_placement::PlacementError;
use memring_store::StoreError;
use memring_types::{KeyRecord, NodeAddr};

/// Which membership change a rebalance was running for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    /// A node was added.
    Join,
    /// A node was removed.
    Leave,
}

impl fmt::Display for MembershipChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Join => f.write_str("join"),
            Self::Leave => f.write_str("leave"),
        }
    }
}

/// Errors that can occur during directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// Ring collision, empty ring, or ring/registry disagreement.
    #[error("placement error: {0}")]
    Placement(#[from] PlacementError),

    /// A backend call failed.
    #[error("backend error: {0}")]
    Store(#[from] StoreError),

    /// The node is not a member of the directory.
    #[error("unknown node: {0}")]
    UnknownNode(NodeAddr),

    /// The node is already a member of the directory.
    #[error("node already present: {0}")]
    DuplicateNode(NodeAddr),

    /// Migration stopped part-way through a membership change.
    ///
    /// The membership change itself took effect. Records migrated before
    /// the failure are fully re-homed; for a join the rest stay tracked
    /// under their previous owner, for a leave they are returned in
    /// `remaining` since their owner is gone.
    #[error("{change} of {node}: rebalance stopped after {migrated} records: {source}")]
    Rebalance {
        /// The node that joined or left.
        node: NodeAddr,
        /// Join or leave.
        change: MembershipChange,
        /// Records re-homed before the failure.
        migrated: usize,
        /// Records of a departed node that were not re-homed.
        remaining: Vec<KeyRecord>,
        /// The failure that stopped the migration.
        #[source]
        source: Box<DirectoryError>,
    },
}
