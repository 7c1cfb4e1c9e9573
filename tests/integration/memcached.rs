//! Integration test: the directory over real TCP connections.
//!
//! Each node is a [`FakeMemcached`] server; the directory talks to them
//! through `MemcacheConnector` exactly as it would to memcached.

use std::sync::Arc;
use std::time::Duration;

use memring_directory::{Directory, DirectoryConfig, DirectoryError};
use memring_integration_tests::{FakeMemcached, test_key, test_value};
use memring_store::{MemcacheConnector, StoreError};
use memring_types::NodeAddr;

const KEYS: usize = 60;

async fn servers(n: usize) -> Vec<FakeMemcached> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(FakeMemcached::spawn().await);
    }
    out
}

async fn directory(servers: &[FakeMemcached]) -> Directory {
    let connector = Arc::new(MemcacheConnector::new(Some(Duration::from_secs(2))));
    Directory::connect(
        DirectoryConfig::default(),
        connector,
        servers.iter().map(|s| s.addr().clone()),
    )
    .await
    .unwrap()
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_round_trip_over_tcp() {
    let nodes = servers(3).await;
    let dir = directory(&nodes).await;

    for i in 0..KEYS {
        dir.set(&test_key(i), test_value(i)).await.unwrap();
    }
    for i in 0..KEYS {
        assert_eq!(dir.get(&test_key(i)).await.unwrap(), Some(test_value(i)));
    }
    assert_eq!(dir.get("missing").await.unwrap(), None);

    // Three nodes, one owner and two replicas: every server holds every key.
    for server in &nodes {
        assert_eq!(server.len(), KEYS);
    }
}

#[tokio::test]
#[ntest::timeout(15000)]
async fn test_churn_over_tcp() {
    let mut nodes = servers(5).await;
    let dir = directory(&nodes[..4]).await;

    for i in 0..KEYS {
        dir.set(&test_key(i), test_value(i)).await.unwrap();
    }

    dir.remove_node(nodes[0].addr()).await.unwrap();
    for i in 0..KEYS {
        assert_eq!(dir.get(&test_key(i)).await.unwrap(), Some(test_value(i)));
    }

    let joined = nodes.remove(4);
    let migrated = dir.add_node(joined.addr().clone()).await.unwrap();
    for i in 0..KEYS {
        assert_eq!(dir.get(&test_key(i)).await.unwrap(), Some(test_value(i)));
    }
    for record in dir.tracked_keys(joined.addr()).await {
        assert!(joined.contains_key(&record.key));
    }
    assert_eq!(dir.tracked_keys(joined.addr()).await.len(), migrated);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_unreachable_node_is_rejected() {
    let nodes = servers(2).await;
    let dir = directory(&nodes).await;

    // Bind then drop to get a port nothing listens on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dead = NodeAddr::new("127.0.0.1", port);

    let err = dir.add_node(dead.clone()).await.unwrap_err();
    assert!(matches!(err, DirectoryError::Store(StoreError::Connect { .. })));
    assert!(!dir.contains_node(&dead).await);
    assert_eq!(dir.node_count().await, 2);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_invalid_key_is_refused_before_sending() {
    let nodes = servers(3).await;
    let dir = directory(&nodes).await;

    let err = dir.set("has space", "v").await.unwrap_err();
    assert!(matches!(err, DirectoryError::Store(StoreError::InvalidKey(_))));
    assert!(nodes.iter().all(FakeMemcached::is_empty));
}
