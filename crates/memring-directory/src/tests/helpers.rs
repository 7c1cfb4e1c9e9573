//! Shared test utilities for directory tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use memring_placement::Ring;
use memring_store::MemoryConnector;
use memring_types::NodeAddr;

use crate::{Directory, DirectoryConfig};

pub const BASE_PORT: u16 = 11211;

pub fn addr(port: u16) -> NodeAddr {
    NodeAddr::new("127.0.0.1", port)
}

/// `count` consecutive addresses starting at [`BASE_PORT`].
pub fn addrs(count: u16) -> Vec<NodeAddr> {
    (0..count).map(|i| addr(BASE_PORT + i)).collect()
}

pub fn key(i: usize) -> String {
    format!("key-{i}")
}

pub fn value(i: usize) -> Bytes {
    Bytes::from(format!("value-{i}"))
}

/// A directory over in-memory backends with `nodes` joined in order.
pub async fn cluster(nodes: &[NodeAddr]) -> (Directory, Arc<MemoryConnector>) {
    let connector = Arc::new(MemoryConnector::new());
    let directory = Directory::connect(
        DirectoryConfig::default(),
        connector.clone(),
        nodes.iter().cloned(),
    )
    .await
    .unwrap();
    (directory, connector)
}

/// Write keys `0..count` with their canonical values.
pub async fn fill(directory: &Directory, count: usize) {
    for i in 0..count {
        directory.set(&key(i), value(i)).await.unwrap();
    }
}

/// Nodes among `candidates` whose backend physically holds `key`.
pub fn holders(
    connector: &MemoryConnector,
    candidates: &[NodeAddr],
    key: &str,
) -> BTreeSet<NodeAddr> {
    candidates
        .iter()
        .filter(|node| connector.store(node).contains_key(key))
        .cloned()
        .collect()
}

/// Owner of `key` followed by its replicas, as the directory sees them now.
pub async fn placement(directory: &Directory, key: &str) -> BTreeSet<NodeAddr> {
    let owner = directory.owner_of(key).await.unwrap();
    let mut nodes: BTreeSet<NodeAddr> = directory.replicas_of(&owner).await.into_iter().collect();
    nodes.insert(owner);
    nodes
}

/// First port at or above `from` whose node would own at least one of
/// keys `0..count` once joined to `existing`.
pub fn port_taking_keys(existing: &[NodeAddr], count: usize, from: u16) -> u16 {
    (from..from + 1000)
        .find(|&port| {
            let mut ring = Ring::new(DirectoryConfig::default().vnodes_per_node);
            for node in existing {
                ring.add_node(node.clone()).unwrap();
            }
            let candidate = addr(port);
            if ring.add_node(candidate.clone()).is_err() {
                return false;
            }
            (0..count).any(|i| ring.locate(&key(i)).unwrap() == &candidate)
        })
        .expect("some port takes a key")
}
