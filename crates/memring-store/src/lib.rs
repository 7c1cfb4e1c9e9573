//! Key-value storage backends.
//!
//! This crate defines the [`KvStore`] trait the directory uses to talk to a
//! physical node, the [`StoreConnector`] trait used to open one handle per
//! node, and three implementations:
//!
//! - [`MemcacheStore`]: memcached text protocol over a single TCP connection.
//! - [`MemoryStore`]: in-process storage backed by a `RwLock<HashMap>`.
//! - [`SlowConnector`]/[`SlowStore`]: per-operation latency injection, for tests.

mod error;
mod memcache;
mod memory_store;
mod slow_store;
mod traits;

pub use error::StoreError;
pub use memcache::{MAX_KEY_LEN, MAX_VALUE_LEN, MemcacheConnector, MemcacheStore, validate_key};
pub use memory_store::{MemoryConnector, MemoryStore};
pub use slow_store::{LatencyProfile, SlowConnector, SlowStore, StoreOp};
pub use traits::{KvStore, StoreConnector};
