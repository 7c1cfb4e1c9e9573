//! [`Directory`]: the public face of the crate.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use memring_store::StoreConnector;
use memring_types::{KeyRecord, NodeAddr};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::DirectoryError;
use crate::rebalance;
use crate::state::DirectoryState;

/// Configuration for creating a [`Directory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// Virtual positions per physical node on the ring.
    pub vnodes_per_node: u16,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self { vnodes_per_node: 2 }
    }
}

/// Snapshot of one node, as reported by [`Directory::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    /// The node's address.
    pub addr: NodeAddr,
    /// Ring positions the node occupies, by virtual-node index.
    pub positions: Vec<u32>,
    /// The node's current replicas, in ring order.
    pub replicas: Vec<NodeAddr>,
    /// Number of records tracked under the node.
    pub tracked: usize,
}

/// Replicated consistent-hashing directory over a dynamic set of backends.
///
/// Every operation takes the state lock for its full duration, backend
/// round-trips included, so a reader never observes a half-finished
/// rebalance.
pub struct Directory {
    state: Mutex<DirectoryState>,
    connector: Arc<dyn StoreConnector>,
    config: DirectoryConfig,
}

impl Directory {
    /// Create an empty directory. Nodes are opened through `connector`.
    pub fn new(config: DirectoryConfig, connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            state: Mutex::new(DirectoryState::new(config.vnodes_per_node)),
            connector,
            config,
        }
    }

    /// Create a directory and join each of `nodes` in order.
    pub async fn connect(
        config: DirectoryConfig,
        connector: Arc<dyn StoreConnector>,
        nodes: impl IntoIterator<Item = NodeAddr>,
    ) -> Result<Self, DirectoryError> {
        let directory = Self::new(config, connector);
        for node in nodes {
            directory.add_node(node).await?;
        }
        Ok(directory)
    }

    /// The configuration this directory was created with.
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Write `value` under `key` to its owner and the owner's replicas.
    ///
    /// Returns the owner the record is now tracked under.
    pub async fn set(
        &self,
        key: &str,
        value: impl Into<Bytes>,
    ) -> Result<NodeAddr, DirectoryError> {
        let mut state = self.state.lock().await;
        state.set(key, value.into()).await
    }

    /// Read `key` from its owner, falling back to the owner's replicas.
    ///
    /// A key held by none of them is `Ok(None)`.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, DirectoryError> {
        let state = self.state.lock().await;
        state.get(key).await
    }

    /// Join `addr` and migrate the records it now owns.
    ///
    /// The backend is connected before the ring is touched; a connect
    /// failure or a position collision leaves the directory unchanged.
    /// Returns the number of records migrated onto the new node.
    pub async fn add_node(&self, addr: NodeAddr) -> Result<usize, DirectoryError> {
        let mut state = self.state.lock().await;
        if state.registry.contains(&addr) {
            return Err(DirectoryError::DuplicateNode(addr));
        }

        let backend = self.connector.connect(&addr).await?;
        let positions = match state.ring.add_node(addr.clone()) {
            Ok(positions) => positions,
            Err(e) => {
                if let Err(close_err) = backend.close().await {
                    warn!(%addr, error = %close_err, "failed to close rejected backend");
                }
                return Err(e.into());
            }
        };

        state.registry.insert(addr.clone(), backend);
        let previous = std::mem::take(&mut state.topology);
        state.rebuild_topology();
        info!(%addr, ?positions, nodes = state.registry.len(), "node joined");

        rebalance::on_join(&mut state, &addr, &positions, &previous).await
    }

    /// Remove `addr` and re-home the records it owned.
    ///
    /// The node's backend is closed without deleting anything from it.
    /// Returns the number of records re-written elsewhere.
    pub async fn remove_node(&self, addr: &NodeAddr) -> Result<usize, DirectoryError> {
        let mut state = self.state.lock().await;
        if !state.registry.contains(addr) {
            return Err(DirectoryError::UnknownNode(addr.clone()));
        }

        state.ring.remove_node(addr)?;
        let records = state.registry.take_tracked(addr);
        let backend = state.registry.remove(addr);
        state.rebuild_topology();
        info!(%addr, records = records.len(), nodes = state.registry.len(), "node left");

        if let Some(backend) = backend
            && let Err(e) = backend.close().await
        {
            warn!(%addr, error = %e, "failed to close departed backend");
        }

        if state.ring.is_empty() {
            if !records.is_empty() {
                debug!(%addr, dropped = records.len(), "last node left, records dropped");
            }
            return Ok(0);
        }

        rebalance::on_leave(&mut state, addr, records).await
    }

    /// Live nodes in ring order.
    pub async fn nodes(&self) -> Vec<NodeAddr> {
        self.state.lock().await.ring.node_order()
    }

    /// Number of member nodes.
    pub async fn node_count(&self) -> usize {
        self.state.lock().await.registry.len()
    }

    /// Whether `addr` is currently a member.
    pub async fn contains_node(&self, addr: &NodeAddr) -> bool {
        self.state.lock().await.registry.contains(addr)
    }

    /// The node that currently owns `key`.
    pub async fn owner_of(&self, key: &str) -> Result<NodeAddr, DirectoryError> {
        Ok(self.state.lock().await.ring.locate(key)?.clone())
    }

    /// Current replicas of `addr`. Empty for an unknown node.
    pub async fn replicas_of(&self, addr: &NodeAddr) -> Vec<NodeAddr> {
        self.state.lock().await.topology.replicas_of(addr).to_vec()
    }

    /// Records tracked under `addr`, oldest first.
    pub async fn tracked_keys(&self, addr: &NodeAddr) -> Vec<KeyRecord> {
        self.state.lock().await.registry.tracked(addr).to_vec()
    }

    /// Per-node snapshot in ring order.
    pub async fn status(&self) -> Vec<NodeStatus> {
        let state = self.state.lock().await;
        state
            .ring
            .node_order()
            .into_iter()
            .map(|addr| NodeStatus {
                positions: state.ring.positions_of(&addr).map(<[u32]>::to_vec).unwrap_or_default(),
                replicas: state.topology.replicas_of(&addr).to_vec(),
                tracked: state.registry.tracked(&addr).len(),
                addr,
            })
            .collect()
    }
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
