//! Integration test: long random membership churn.
//!
//! A seeded sequence of joins and leaves over a fixed key set. After every
//! step each key must read back, be tracked exactly once, and be tracked
//! under its current owner.

use std::collections::HashMap;

use memring_directory::DirectoryConfig;
use memring_integration_tests::{TestCluster, test_key};
use memring_types::NodeAddr;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const KEYS: usize = 200;

async fn assert_bookkeeping(c: &TestCluster) {
    let mut seen: HashMap<String, NodeAddr> = HashMap::new();
    for status in c.directory().status().await {
        for record in c.directory().tracked_keys(&status.addr).await {
            let previous = seen.insert(record.key.clone(), status.addr.clone());
            assert!(previous.is_none(), "{} tracked twice", record.key);
        }
    }
    assert_eq!(seen.len(), KEYS);
    for i in 0..KEYS {
        let key = test_key(i);
        let owner = c.directory().owner_of(&key).await.unwrap();
        assert_eq!(seen[&key], owner, "{key} tracked under a non-owner");
    }
}

async fn churn(seed: u64, config: DirectoryConfig) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut c = TestCluster::with_config(4, config).await;
    let mut live: Vec<NodeAddr> = (0..4).map(TestCluster::addr).collect();
    let mut next = 4u16;

    c.load(KEYS).await;

    for step in 0..20 {
        let join = live.len() <= 2 || (live.len() < 8 && rng.random_bool(0.5));
        if join {
            let addr = TestCluster::addr(next);
            next += 1;
            c.join(addr.clone()).await;
            live.push(addr);
        } else {
            let victim = live.remove(rng.random_range(0..live.len()));
            c.leave(&victim).await;
        }

        assert_eq!(c.directory().node_count().await, live.len(), "step {step}");
        c.assert_readable(KEYS).await;
        assert_bookkeeping(&c).await;
    }
}

#[tokio::test]
#[ntest::timeout(30000)]
async fn test_churn_default_ring() {
    for seed in [1, 2, 3] {
        churn(seed, DirectoryConfig::default()).await;
    }
}

#[tokio::test]
#[ntest::timeout(30000)]
async fn test_churn_dense_ring() {
    churn(11, DirectoryConfig { vnodes_per_node: 32 }).await;
}

/// Departed nodes keep whatever they held; nothing is deleted from them.
#[tokio::test]
#[ntest::timeout(10000)]
async fn test_departed_node_is_left_untouched() {
    let c = TestCluster::new(4).await;
    c.load(KEYS).await;

    let victim = TestCluster::addr(2);
    let before = c.connector().store(&victim).keys();
    c.leave(&victim).await;
    c.load(KEYS).await;

    assert_eq!(c.connector().store(&victim).keys(), before);
}
