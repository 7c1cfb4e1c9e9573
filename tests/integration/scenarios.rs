//! Integration test: the reference churn scenarios.
//!
//! Three nodes, 100 keys; remove one node, then add a fresh one. Every key
//! must stay readable throughout.

use memring_integration_tests::{TestCluster, test_key, test_value};

const KEYS: usize = 100;

/// Scenario A: every written key reads back.
#[tokio::test]
#[ntest::timeout(10000)]
async fn test_three_nodes_all_keys_readable() {
    let c = TestCluster::new(3).await;
    c.load(KEYS).await;
    c.assert_readable(KEYS).await;

    for i in 0..KEYS {
        let key = test_key(i);
        assert_eq!(c.holders(&key), c.placement(&key).await, "{key}");
    }
}

/// Scenario B: dropping a node loses nothing.
#[tokio::test]
#[ntest::timeout(10000)]
async fn test_remove_node_keeps_all_keys() {
    let c = TestCluster::new(3).await;
    c.load(KEYS).await;

    let b = TestCluster::addr(1);
    let owned = c.directory().tracked_keys(&b).await.len();
    assert_eq!(c.leave(&b).await, owned);

    c.assert_readable(KEYS).await;
    assert_eq!(c.directory().node_count().await, 2);
    assert_eq!(c.tracked_total().await, KEYS);
    for i in 0..KEYS {
        assert!(!c.placement(&test_key(i)).await.contains(&b));
    }
}

/// Scenario C: a joining node serves exactly the keys it now owns.
#[tokio::test]
#[ntest::timeout(10000)]
async fn test_add_node_after_remove() {
    let mut c = TestCluster::new(3).await;
    c.load(KEYS).await;
    c.leave(&TestCluster::addr(1)).await;

    let d = TestCluster::addr(3);
    let migrated = c.join(d.clone()).await;
    c.assert_readable(KEYS).await;

    let mut owned = 0;
    for i in 0..KEYS {
        let key = test_key(i);
        if c.directory().owner_of(&key).await.unwrap() == d {
            owned += 1;
            assert_eq!(c.connector().store(&d).peek(&key), Some(test_value(i)));
        }
    }
    assert_eq!(owned, migrated);
    assert_eq!(c.directory().tracked_keys(&d).await.len(), owned);
}

/// Scenario D: a key never written reads as absent.
#[tokio::test]
#[ntest::timeout(5000)]
async fn test_unknown_key_is_absent() {
    let c = TestCluster::new(3).await;
    c.load(10).await;

    assert_eq!(c.directory().get("never-written").await.unwrap(), None);
}

/// Replica-only removal never causes a miss for a key whose owner is live.
#[tokio::test]
#[ntest::timeout(10000)]
async fn test_remove_replica_keeps_owner_reads() {
    let c = TestCluster::new(4).await;
    c.load(KEYS).await;

    let key = test_key(7);
    let owner = c.directory().owner_of(&key).await.unwrap();
    let replica = c.directory().replicas_of(&owner).await[0].clone();

    c.leave(&replica).await;
    assert_eq!(c.directory().owner_of(&key).await.unwrap(), owner);
    assert_eq!(c.directory().get(&key).await.unwrap(), Some(test_value(7)));
    c.assert_readable(KEYS).await;
}
