//! Replica placement derived from the ring's node order.

use std::collections::HashMap;

use memring_types::NodeAddr;

use crate::ring::Ring;

/// Number of backup copies kept for every key, on top of the owner.
pub const REPLICA_COUNT: usize = 2;

/// For every physical node, the distinct nodes holding its backups.
///
/// Derived from the ring's distinct node order: node `i` is backed up by
/// nodes `i + 1` and `i + 2` (mod the member count), never by itself. With
/// one member the set is empty; with two it has a single entry.
///
/// This is a pure function of the ring and must be rebuilt after every
/// membership change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicaTopology {
    /// Distinct nodes in ring order.
    order: Vec<NodeAddr>,
    /// Node -> its backups, in ring order.
    replicas: HashMap<NodeAddr, Vec<NodeAddr>>,
}

impl ReplicaTopology {
    /// Derive the replica sets for the ring's current members.
    pub fn rebuild(ring: &Ring) -> Self {
        let order = ring.node_order();
        let len = order.len();
        let mut replicas = HashMap::with_capacity(len);

        for (i, node) in order.iter().enumerate() {
            let mut set: Vec<NodeAddr> = Vec::with_capacity(REPLICA_COUNT);
            for step in 1..=REPLICA_COUNT {
                let candidate = &order[(i + step) % len];
                if candidate != node && !set.contains(candidate) {
                    set.push(candidate.clone());
                }
            }
            replicas.insert(node.clone(), set);
        }

        Self { order, replicas }
    }

    /// Backups of `node`. Empty for unknown nodes.
    pub fn replicas_of(&self, node: &NodeAddr) -> &[NodeAddr] {
        self.replicas.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct nodes in ring order.
    pub fn order(&self) -> &[NodeAddr] {
        &self.order
    }

    /// Number of members covered.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no members are covered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
