//! Client-side directory spreading keys over memcached-style backends.
//!
//! The [`Directory`] owns the placement ring, the replica topology and the
//! per-node bookkeeping of written keys, and exposes four operations:
//!
//! - **set**: write a key to its owner and the owner's two replicas
//! - **get**: read from the owner, falling back to its replicas
//! - **add_node**: join a backend and migrate the keys it now owns
//! - **remove_node**: drop a backend and re-home the keys it owned
//!
//! All operations are serialized; backend I/O for one operation fans out
//! concurrently across distinct nodes.

mod directory;
mod error;
mod rebalance;
mod registry;
mod state;

pub use directory::{Directory, DirectoryConfig, NodeStatus};
pub use error::{DirectoryError, MembershipChange};

#[cfg(test)]
mod tests;
