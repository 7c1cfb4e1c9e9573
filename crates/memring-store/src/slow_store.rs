//! Latency injection for backends.
//!
//! [`SlowConnector`] wraps another connector and hands out [`SlowStore`]s:
//! each `set`, `get` and `delete` waits a random time drawn from that
//! operation's range in a [`LatencyProfile`] before reaching the real
//! backend. Every store gets its own RNG seeded from the profile seed and
//! the node's port, so a run is reproducible while different nodes still
//! answer out of step with each other.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use memring_types::NodeAddr;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::StoreError;
use crate::traits::{KvStore, StoreConnector};

/// A backend operation that can be delayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Set,
    Get,
    Delete,
}

/// Per-operation delay ranges. Everything is zero (pass-through) by default.
#[derive(Debug, Clone, Default)]
pub struct LatencyProfile {
    set: (Duration, Duration),
    get: (Duration, Duration),
    delete: (Duration, Duration),
    seed: u64,
}

impl LatencyProfile {
    /// Delay every operation by `min..=max`.
    pub fn uniform(min: Duration, max: Duration) -> Self {
        Self::default()
            .on(StoreOp::Set, min, max)
            .on(StoreOp::Get, min, max)
            .on(StoreOp::Delete, min, max)
    }

    /// Delay `op` by `min..=max`.
    pub fn on(mut self, op: StoreOp, min: Duration, max: Duration) -> Self {
        *self.range_mut(op) = (min, max);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn range(&self, op: StoreOp) -> (Duration, Duration) {
        match op {
            StoreOp::Set => self.set,
            StoreOp::Get => self.get,
            StoreOp::Delete => self.delete,
        }
    }

    fn range_mut(&mut self, op: StoreOp) -> &mut (Duration, Duration) {
        match op {
            StoreOp::Set => &mut self.set,
            StoreOp::Get => &mut self.get,
            StoreOp::Delete => &mut self.delete,
        }
    }
}

/// A backend whose calls are delayed according to a [`LatencyProfile`].
pub struct SlowStore {
    inner: Arc<dyn KvStore>,
    profile: LatencyProfile,
    rng: Mutex<StdRng>,
}

impl SlowStore {
    /// Wrap `inner`, seeding the delay RNG with `seed`.
    pub fn new(inner: Arc<dyn KvStore>, profile: LatencyProfile, seed: u64) -> Self {
        Self {
            inner,
            profile,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn pick(&self, op: StoreOp) -> Duration {
        let (min, max) = self.profile.range(op);
        if min >= max {
            return max;
        }
        let mut rng = self.rng.lock().expect("lock poisoned");
        rng.random_range(min..=max)
    }

    async fn pause(&self, op: StoreOp) {
        let wait = self.pick(op);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl KvStore for SlowStore {
    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        self.pause(StoreOp::Set).await;
        self.inner.set(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.pause(StoreOp::Get).await;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.pause(StoreOp::Delete).await;
        self.inner.delete(key).await
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.inner.close().await
    }
}

/// Connector that wraps every backend it opens in a [`SlowStore`].
pub struct SlowConnector {
    inner: Arc<dyn StoreConnector>,
    profile: LatencyProfile,
}

impl SlowConnector {
    pub fn new(inner: Arc<dyn StoreConnector>, profile: LatencyProfile) -> Self {
        Self { inner, profile }
    }
}

#[async_trait::async_trait]
impl StoreConnector for SlowConnector {
    async fn connect(&self, addr: &NodeAddr) -> Result<Arc<dyn KvStore>, StoreError> {
        let inner = self.inner.connect(addr).await?;
        let seed = self.profile.seed ^ u64::from(addr.port());
        Ok(Arc::new(SlowStore::new(inner, self.profile.clone(), seed)))
    }
}
