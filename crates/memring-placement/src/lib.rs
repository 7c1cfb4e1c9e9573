//! Consistent hashing ring for key placement.
//!
//! This crate maps string keys to physical storage nodes. Each node owns a
//! small number of virtual positions on a 32-bit circular key space,
//! placed at `murmur3_32("{host}:{port}-{index}")`. A key belongs to the
//! node owning the first position at or after `murmur3_32(key)`, wrapping
//! around past the largest position.
//!
//! [`ReplicaTopology`] derives, from the ring's node order, the two
//! distinct nodes that hold backup copies of everything a node owns.

mod error;
mod replicas;
mod ring;

pub use error::PlacementError;
pub use replicas::{REPLICA_COUNT, ReplicaTopology};
pub use ring::{Ring, hash32};
