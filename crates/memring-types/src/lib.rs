//! Shared types for memring.
//!
//! This crate defines the identity of a physical storage node
//! ([`NodeAddr`]) and the bookkeeping record the directory keeps for every
//! key it has written ([`KeyRecord`]).

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Node identity
// ---------------------------------------------------------------------------

/// Identity of a physical storage node: the `(host, port)` its backend
/// listens on.
///
/// The structured value is what every map in the directory is keyed by.
/// The `host:port` string form is only used to derive ring seeds (see
/// [`NodeAddr::vnode_seed`]) and for display.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeAddr {
    host: String,
    port: u16,
}

impl NodeAddr {
    /// Create a node address from its parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or IP literal.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Seed string hashed to place virtual node `index` on the ring:
    /// `"{host}:{port}-{index}"`.
    pub fn vnode_seed(&self, index: u16) -> String {
        format!("{self}-{index}")
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeAddr({self})")
    }
}

/// Failure to parse a `host:port` string into a [`NodeAddr`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddrParseError {
    /// No `:` separator between host and port.
    #[error("missing port in node address {0:?}")]
    MissingPort(String),

    /// The host part is empty.
    #[error("empty host in node address {0:?}")]
    EmptyHost(String),

    /// The port is not a valid `u16`.
    #[error("invalid port in node address {0:?}")]
    InvalidPort(String),
}

impl FromStr for NodeAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddrParseError::MissingPort(s.to_string()))?;
        if host.is_empty() {
            return Err(AddrParseError::EmptyHost(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| AddrParseError::InvalidPort(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for NodeAddr {
    type Error = AddrParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NodeAddr> for String {
    fn from(addr: NodeAddr) -> Self {
        addr.to_string()
    }
}

// ---------------------------------------------------------------------------
// Bookkeeping
// ---------------------------------------------------------------------------

/// A key/value pair the directory believes is owned by some node.
///
/// The owner is implicit: records live in per-node lists keyed by
/// [`NodeAddr`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    /// The key as written by the caller.
    pub key: String,
    /// The last value written for this record.
    pub value: Bytes,
}

impl KeyRecord {
    /// Create a record.
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
