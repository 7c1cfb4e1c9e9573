//! Core traits for key-value backends.

use std::sync::Arc;

use bytes::Bytes;
use memring_types::NodeAddr;

use crate::error::StoreError;

/// A single node's key-value store.
///
/// All implementations must be `Send + Sync` for use across async tasks.
/// Values are passed as [`Bytes`] so one buffer can be fanned out to an
/// owner and its replicas without copying.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    /// Store `value` under `key`, overwriting any previous value.
    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError>;

    /// Retrieve the value for `key`. Returns `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Delete `key`. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Release the connection held for this node.
    async fn close(&self) -> Result<(), StoreError>;
}

/// Opens backend handles for physical nodes.
#[async_trait::async_trait]
pub trait StoreConnector: Send + Sync {
    /// Open a handle to the backend listening at `addr`.
    async fn connect(&self, addr: &NodeAddr) -> Result<Arc<dyn KvStore>, StoreError>;
}
