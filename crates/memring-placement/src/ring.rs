//! Consistent hashing ring implementation.

use std::collections::{BTreeMap, HashMap};

use memring_types::NodeAddr;
use tracing::debug;

use crate::error::PlacementError;

/// Consistent hashing ring for deterministic key placement.
///
/// Each physical node is mapped to `vnodes_per_node` positions on a `u32`
/// ring. The positions are kept in a `BTreeMap`, so they are always sorted
/// and duplicate-free, and successor lookup is `O(log n)`.
#[derive(Debug, Clone)]
pub struct Ring {
    /// Virtual node positions: ring position -> physical node.
    vnodes: BTreeMap<u32, NodeAddr>,
    /// Positions owned by each physical node, in vnode-index order.
    nodes: HashMap<NodeAddr, Vec<u32>>,
    /// Number of virtual positions per physical node.
    vnodes_per_node: u16,
}

impl Ring {
    /// Create a new empty ring.
    pub fn new(vnodes_per_node: u16) -> Self {
        Self {
            vnodes: BTreeMap::new(),
            nodes: HashMap::new(),
            vnodes_per_node,
        }
    }

    /// Number of virtual positions each physical node receives.
    pub fn vnodes_per_node(&self) -> u16 {
        self.vnodes_per_node
    }

    /// Add a node to the ring, returning the positions it now owns.
    ///
    /// All positions are computed and checked before anything is inserted:
    /// if any of them is already taken (by another node, or by another of
    /// this node's own vnodes), the ring is left untouched.
    pub fn add_node(&mut self, node: NodeAddr) -> Result<Vec<u32>, PlacementError> {
        if self.vnodes_per_node == 0 {
            return Err(PlacementError::InvalidVnodeCount);
        }
        if self.nodes.contains_key(&node) {
            return Err(PlacementError::AlreadyPresent(node));
        }

        let mut positions: Vec<u32> = Vec::with_capacity(self.vnodes_per_node as usize);
        for i in 0..self.vnodes_per_node {
            let pos = vnode_position(&node, i);
            if let Some(existing) = self.vnodes.get(&pos) {
                return Err(PlacementError::PositionCollision {
                    position: pos,
                    existing: existing.clone(),
                    incoming: node,
                });
            }
            if positions.contains(&pos) {
                return Err(PlacementError::PositionCollision {
                    position: pos,
                    existing: node.clone(),
                    incoming: node,
                });
            }
            positions.push(pos);
        }

        for &pos in &positions {
            self.vnodes.insert(pos, node.clone());
        }
        debug!(%node, ?positions, "added node to ring");
        self.nodes.insert(node, positions.clone());

        Ok(positions)
    }

    /// Remove a node and all of its positions from the ring.
    ///
    /// Returns the positions the node owned.
    pub fn remove_node(&mut self, node: &NodeAddr) -> Result<Vec<u32>, PlacementError> {
        let positions = self
            .nodes
            .remove(node)
            .ok_or_else(|| PlacementError::UnknownNode(node.clone()))?;
        for pos in &positions {
            self.vnodes.remove(pos);
        }
        debug!(%node, "removed node from ring");
        Ok(positions)
    }

    /// Find the node that owns `key`.
    ///
    /// The owner holds the smallest position `>= murmur3_32(key)`; past the
    /// largest position the lookup wraps to the smallest one.
    pub fn locate(&self, key: &str) -> Result<&NodeAddr, PlacementError> {
        let h = hash32(key);
        self.vnodes
            .range(h..)
            .next()
            .or_else(|| self.vnodes.iter().next())
            .map(|(_, node)| node)
            .ok_or(PlacementError::EmptyRing)
    }

    /// The first position strictly after `position` clockwise, wrapping
    /// around. Returns `None` on an empty ring.
    ///
    /// On a ring with a single position this returns that position itself.
    pub fn successor(&self, position: u32) -> Option<(u32, &NodeAddr)> {
        let after = position
            .checked_add(1)
            .and_then(|next| self.vnodes.range(next..).next());
        after
            .or_else(|| self.vnodes.iter().next())
            .map(|(pos, node)| (*pos, node))
    }

    /// Distinct physical nodes in ring order.
    ///
    /// Walks the positions from smallest to largest and keeps each node the
    /// first time it is seen.
    pub fn node_order(&self) -> Vec<NodeAddr> {
        let mut order: Vec<NodeAddr> = Vec::with_capacity(self.nodes.len());
        for node in self.vnodes.values() {
            if !order.contains(node) {
                order.push(node.clone());
                if order.len() == self.nodes.len() {
                    break;
                }
            }
        }
        order
    }

    /// Positions owned by `node`, if it is on the ring.
    pub fn positions_of(&self, node: &NodeAddr) -> Option<&[u32]> {
        self.nodes.get(node).map(Vec::as_slice)
    }

    /// Whether `node` has positions on the ring.
    pub fn contains(&self, node: &NodeAddr) -> bool {
        self.nodes.contains_key(node)
    }

    /// Iterate over `(position, node)` pairs in ring order.
    pub fn vnodes(&self) -> impl Iterator<Item = (u32, &NodeAddr)> {
        self.vnodes.iter().map(|(pos, node)| (*pos, node))
    }

    /// Return the number of physical nodes in the ring.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Return the total number of vnodes in the ring.
    pub fn vnode_count(&self) -> usize {
        self.vnodes.len()
    }

    /// Whether the ring has no nodes.
    pub fn is_empty(&self) -> bool {
        self.vnodes.is_empty()
    }
}

/// 32-bit MurmurHash3 (x86 variant, seed 0) of the UTF-8 bytes of `s`.
///
/// Both key lookup and vnode placement go through this function, so a node
/// re-derives exactly the same positions every time it is hashed.
pub fn hash32(s: &str) -> u32 {
    let mut bytes = s.as_bytes();
    murmur3::murmur3_32(&mut bytes, 0).expect("reading from a byte slice cannot fail")
}

/// Compute a vnode's position on the ring: `murmur3_32("{node}-{index}")`.
fn vnode_position(node: &NodeAddr, vnode_index: u16) -> u32 {
    hash32(&node.vnode_seed(vnode_index))
}
