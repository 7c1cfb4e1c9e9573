//! The directory's mutable state and the read/write paths over it.

use bytes::Bytes;
use futures::future::try_join_all;
use memring_placement::{ReplicaTopology, Ring};
use memring_types::{KeyRecord, NodeAddr};
use tracing::debug;

use crate::error::DirectoryError;
use crate::registry::NodeRegistry;

/// Ring, replica topology and registry, always mutated together under the
/// directory lock.
pub(crate) struct DirectoryState {
    pub(crate) ring: Ring,
    pub(crate) topology: ReplicaTopology,
    pub(crate) registry: NodeRegistry,
}

impl DirectoryState {
    pub(crate) fn new(vnodes_per_node: u16) -> Self {
        Self {
            ring: Ring::new(vnodes_per_node),
            topology: ReplicaTopology::default(),
            registry: NodeRegistry::default(),
        }
    }

    /// Re-derive replica sets after a ring change.
    pub(crate) fn rebuild_topology(&mut self) {
        self.topology = ReplicaTopology::rebuild(&self.ring);
    }

    /// `owner` followed by its current replicas.
    pub(crate) fn placement(&self, owner: &NodeAddr) -> Vec<NodeAddr> {
        let mut nodes = Vec::with_capacity(1 + self.topology.replicas_of(owner).len());
        nodes.push(owner.clone());
        nodes.extend(self.topology.replicas_of(owner).iter().cloned());
        nodes
    }

    /// Write path: store on the owner and its replicas, then track the
    /// record under the owner. Returns the owner.
    ///
    /// Records already tracked for `key` under other nodes are left alone.
    pub(crate) async fn set(
        &mut self,
        key: &str,
        value: Bytes,
    ) -> Result<NodeAddr, DirectoryError> {
        let owner = self.ring.locate(key)?.clone();
        let targets = self.placement(&owner);

        self.set_on(&targets, key, &value).await?;
        self.registry.track(&owner, KeyRecord::new(key, value));

        debug!(key, %owner, copies = targets.len(), "set key");
        Ok(owner)
    }

    /// Read path: the owner first, then each replica in ring order.
    pub(crate) async fn get(&self, key: &str) -> Result<Option<Bytes>, DirectoryError> {
        let owner = self.ring.locate(key)?;

        if let Some(value) = self.registry.backend(owner)?.get(key).await? {
            return Ok(Some(value));
        }

        for replica in self.topology.replicas_of(owner) {
            if let Some(value) = self.registry.backend(replica)?.get(key).await? {
                debug!(key, %owner, %replica, "served from replica");
                return Ok(Some(value));
            }
        }

        Ok(None)
    }

    /// Write `value` to every node in `targets` concurrently.
    pub(crate) async fn set_on(
        &self,
        targets: &[NodeAddr],
        key: &str,
        value: &Bytes,
    ) -> Result<(), DirectoryError> {
        let stores = targets
            .iter()
            .map(|node| self.registry.backend(node))
            .collect::<Result<Vec<_>, _>>()?;
        try_join_all(stores.into_iter().map(|store| store.set(key, value.clone()))).await?;
        Ok(())
    }

    /// Delete `key` from every node in `targets` concurrently.
    pub(crate) async fn delete_on(
        &self,
        targets: &[NodeAddr],
        key: &str,
    ) -> Result<(), DirectoryError> {
        let stores = targets
            .iter()
            .map(|node| self.registry.backend(node))
            .collect::<Result<Vec<_>, _>>()?;
        try_join_all(stores.into_iter().map(|store| store.delete(key))).await?;
        Ok(())
    }
}
