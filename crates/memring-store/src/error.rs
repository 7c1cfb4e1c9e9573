//! Error types for backend operations.

use std::time::Duration;

use memring_types::NodeAddr;

/// Errors that can occur while talking to a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Could not open a connection to the backend.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// The backend address.
        addr: NodeAddr,
        /// The underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O error on an established connection.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend did not answer within the configured timeout.
    #[error("backend {addr} timed out after {after:?}")]
    Timeout {
        /// The backend address.
        addr: NodeAddr,
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The backend sent a reply the client does not understand, or an
    /// error reply (`ERROR`, `CLIENT_ERROR`, `SERVER_ERROR`).
    #[error("protocol error from {addr}: {message}")]
    Protocol {
        /// The backend address.
        addr: NodeAddr,
        /// What went wrong.
        message: String,
    },

    /// The key cannot be sent to this backend.
    #[error("invalid key {0:?}")]
    InvalidKey(String),

    /// The backend refuses requests (failure injection in tests).
    #[error("backend {0} is unavailable")]
    Unavailable(NodeAddr),

    /// The handle was closed.
    #[error("connection to {0} is closed")]
    Closed(NodeAddr),
}
