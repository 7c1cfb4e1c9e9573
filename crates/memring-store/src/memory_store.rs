//! In-memory key-value backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use bytes::Bytes;
use memring_types::NodeAddr;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{KvStore, StoreConnector};

/// In-memory key-value store backed by a `RwLock<HashMap>`.
///
/// Stands in for a memcached process in tests and in `--memory` mode. It
/// can be switched offline, after which every call fails with
/// [`StoreError::Unavailable`].
pub struct MemoryStore {
    addr: NodeAddr,
    entries: RwLock<HashMap<String, Bytes>>,
    offline: AtomicBool,
    closes: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store for the node at `addr`.
    pub fn new(addr: NodeAddr) -> Self {
        Self {
            addr,
            entries: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
            closes: AtomicUsize::new(0),
        }
    }

    /// The node this store stands in for.
    pub fn addr(&self) -> &NodeAddr {
        &self.addr
    }

    /// Make every subsequent call fail (`true`) or succeed again (`false`).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// How many times a handle to this store has been closed.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Read a value without going through the async trait.
    pub fn peek(&self, key: &str) -> Option<Bytes> {
        self.entries.read().expect("lock poisoned").get(key).cloned()
    }

    /// Whether `key` is stored.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().expect("lock poisoned").contains_key(key)
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored key, as an evicting memcached would.
    pub fn clear(&self) {
        self.entries.write().expect("lock poisoned").clear();
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(self.addr.clone()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        self.check_online()?;
        debug!(addr = %self.addr, key, size = value.len(), "storing key in memory");
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.check_online()?;
        Ok(self.peek(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_online()?;
        self.entries.write().expect("lock poisoned").remove(key);
        debug!(addr = %self.addr, key, "deleted key from memory");
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing out one shared [`MemoryStore`] per address.
///
/// Connecting twice to the same address returns the same store, so data
/// outlives a node's removal from the directory the way a real memcached
/// process would. Addresses can be marked as refusing connections.
#[derive(Default)]
pub struct MemoryConnector {
    stores: Mutex<HashMap<NodeAddr, Arc<MemoryStore>>>,
    refused: Mutex<Vec<NodeAddr>>,
}

impl MemoryConnector {
    /// Create a connector with no stores.
    pub fn new() -> Self {
        Self::default()
    }

    /// The store behind `addr`, created empty on first use.
    pub fn store(&self, addr: &NodeAddr) -> Arc<MemoryStore> {
        self.stores
            .lock()
            .expect("lock poisoned")
            .entry(addr.clone())
            .or_insert_with(|| Arc::new(MemoryStore::new(addr.clone())))
            .clone()
    }

    /// Make [`StoreConnector::connect`] fail for `addr` (`true`) or work again.
    pub fn set_refused(&self, addr: &NodeAddr, refused: bool) {
        let mut list = self.refused.lock().expect("lock poisoned");
        list.retain(|a| a != addr);
        if refused {
            list.push(addr.clone());
        }
    }
}

#[async_trait::async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self, addr: &NodeAddr) -> Result<Arc<dyn KvStore>, StoreError> {
        if self.refused.lock().expect("lock poisoned").contains(addr) {
            return Err(StoreError::Connect {
                addr: addr.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ),
            });
        }
        Ok(self.store(addr))
    }
}
