//! Live backends and per-node key bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;

use memring_store::KvStore;
use memring_types::{KeyRecord, NodeAddr};

use crate::error::DirectoryError;

/// Tracks the backend handle of every live node and the records the
/// directory believes each node owns.
///
/// The record lists are bookkeeping only; they are never read back from
/// the backends.
#[derive(Default)]
pub(crate) struct NodeRegistry {
    backends: HashMap<NodeAddr, Arc<dyn KvStore>>,
    tracked: HashMap<NodeAddr, Vec<KeyRecord>>,
}

impl NodeRegistry {
    pub(crate) fn insert(&mut self, addr: NodeAddr, backend: Arc<dyn KvStore>) {
        self.backends.insert(addr, backend);
    }

    /// Drop a node's backend handle. Its records must be taken separately.
    pub(crate) fn remove(&mut self, addr: &NodeAddr) -> Option<Arc<dyn KvStore>> {
        self.backends.remove(addr)
    }

    pub(crate) fn contains(&self, addr: &NodeAddr) -> bool {
        self.backends.contains_key(addr)
    }

    pub(crate) fn backend(&self, addr: &NodeAddr) -> Result<&Arc<dyn KvStore>, DirectoryError> {
        self.backends
            .get(addr)
            .ok_or_else(|| DirectoryError::UnknownNode(addr.clone()))
    }

    pub(crate) fn len(&self) -> usize {
        self.backends.len()
    }

    /// Records tracked under `addr`, oldest first.
    pub(crate) fn tracked(&self, addr: &NodeAddr) -> &[KeyRecord] {
        self.tracked.get(addr).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn track(&mut self, addr: &NodeAddr, record: KeyRecord) {
        self.tracked.entry(addr.clone()).or_default().push(record);
    }

    /// Remove the first record under `addr` equal to `record`.
    pub(crate) fn untrack(&mut self, addr: &NodeAddr, record: &KeyRecord) -> bool {
        let Some(list) = self.tracked.get_mut(addr) else {
            return false;
        };
        match list.iter().position(|r| r == record) {
            Some(idx) => {
                list.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Remove and return every record tracked under `addr`.
    pub(crate) fn take_tracked(&mut self, addr: &NodeAddr) -> Vec<KeyRecord> {
        self.tracked.remove(addr).unwrap_or_default()
    }
}
