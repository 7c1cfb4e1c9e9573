//! Shared test harness for memring integration tests.
//!
//! Provides [`TestCluster`], a directory over in-memory backends whose
//! contents stay inspectable after nodes leave, and [`FakeMemcached`], a
//! minimal memcached text-protocol server for end-to-end wire tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use memring_directory::{Directory, DirectoryConfig};
use memring_store::MemoryConnector;
use memring_types::NodeAddr;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::debug;

/// First port handed out by [`TestCluster`].
pub const BASE_PORT: u16 = 11211;

// =========================================================================
// In-memory cluster
// =========================================================================

/// A directory over in-memory backends.
///
/// Every address ever joined is remembered so tests can check where a key
/// physically lives, including on nodes that have since left.
pub struct TestCluster {
    directory: Directory,
    connector: Arc<MemoryConnector>,
    known: Vec<NodeAddr>,
}

impl TestCluster {
    /// A cluster of `n` nodes on consecutive ports from [`BASE_PORT`].
    pub async fn new(n: u16) -> Self {
        Self::with_config(n, DirectoryConfig::default()).await
    }

    pub async fn with_config(n: u16, config: DirectoryConfig) -> Self {
        let connector = Arc::new(MemoryConnector::new());
        let known: Vec<NodeAddr> = (0..n).map(Self::addr).collect();
        let directory = Directory::connect(config, connector.clone(), known.iter().cloned())
            .await
            .unwrap();
        Self {
            directory,
            connector,
            known,
        }
    }

    /// Address of the `i`-th node this harness would create.
    pub fn addr(i: u16) -> NodeAddr {
        NodeAddr::new("localhost", BASE_PORT + i)
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn connector(&self) -> &MemoryConnector {
        &self.connector
    }

    /// Write keys `0..count` with values from [`test_value`].
    pub async fn load(&self, count: usize) {
        for i in 0..count {
            self.directory.set(&test_key(i), test_value(i)).await.unwrap();
        }
    }

    /// Join `addr` and remember it.
    pub async fn join(&mut self, addr: NodeAddr) -> usize {
        let migrated = self.directory.add_node(addr.clone()).await.unwrap();
        if !self.known.contains(&addr) {
            self.known.push(addr);
        }
        migrated
    }

    pub async fn leave(&self, addr: &NodeAddr) -> usize {
        self.directory.remove_node(addr).await.unwrap()
    }

    /// Every node, live or departed, whose backend holds `key`.
    pub fn holders(&self, key: &str) -> BTreeSet<NodeAddr> {
        self.known
            .iter()
            .filter(|node| self.connector.store(node).contains_key(key))
            .cloned()
            .collect()
    }

    /// Owner of `key` plus its replicas.
    pub async fn placement(&self, key: &str) -> BTreeSet<NodeAddr> {
        let owner = self.directory.owner_of(key).await.unwrap();
        let mut nodes: BTreeSet<NodeAddr> =
            self.directory.replicas_of(&owner).await.into_iter().collect();
        nodes.insert(owner);
        nodes
    }

    /// Assert keys `0..count` all read back their loaded values.
    pub async fn assert_readable(&self, count: usize) {
        for i in 0..count {
            assert_eq!(
                self.directory.get(&test_key(i)).await.unwrap(),
                Some(test_value(i)),
                "key {} unreadable",
                test_key(i)
            );
        }
    }

    /// Sum of tracked records across live nodes.
    pub async fn tracked_total(&self) -> usize {
        self.directory.status().await.iter().map(|s| s.tracked).sum()
    }
}

pub fn test_key(i: usize) -> String {
    format!("key-{i:04}")
}

pub fn test_value(i: usize) -> Bytes {
    Bytes::from(format!("value-{i:04}-{}", i.wrapping_mul(2_654_435_761) % 1_000_003))
}

// =========================================================================
// Fake memcached
// =========================================================================

type Entries = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// A memcached stand-in speaking `set`, `get`, `delete` and `quit`.
pub struct FakeMemcached {
    addr: NodeAddr,
    entries: Entries,
}

impl FakeMemcached {
    /// Bind to an ephemeral localhost port and serve until the runtime
    /// shuts down.
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let entries: Entries = Arc::default();
        let shared = entries.clone();

        tokio::spawn(async move {
            while let Ok((socket, peer)) = listener.accept().await {
                debug!(%peer, "fake memcached accepted connection");
                let entries = shared.clone();
                tokio::spawn(async move {
                    let (read, mut write) = socket.into_split();
                    let mut reader = BufReader::new(read);
                    loop {
                        let mut line = String::new();
                        if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                            return;
                        }
                        let parts: Vec<String> =
                            line.split_whitespace().map(str::to_string).collect();
                        let reply = match parts.first().map(String::as_str) {
                            Some("set") if parts.len() == 5 => {
                                let Ok(len) = parts[4].parse::<usize>() else {
                                    return;
                                };
                                let mut buf = vec![0u8; len + 2];
                                if reader.read_exact(&mut buf).await.is_err() {
                                    return;
                                }
                                buf.truncate(len);
                                store(&entries, &parts[1], buf)
                            }
                            Some("quit") => return,
                            _ => respond(&entries, &parts),
                        };
                        if write.write_all(&reply).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });

        Self {
            addr: NodeAddr::new("127.0.0.1", port),
            entries,
        }
    }

    pub fn addr(&self) -> &NodeAddr {
        &self.addr
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn store(entries: &Entries, key: &str, value: Vec<u8>) -> Vec<u8> {
    entries.lock().unwrap().insert(key.to_string(), value);
    b"STORED\r\n".to_vec()
}

fn respond(entries: &Entries, parts: &[String]) -> Vec<u8> {
    let mut map = entries.lock().unwrap();
    match parts {
        [cmd, key] if cmd == "get" => match map.get(key) {
            Some(v) => {
                let mut out = format!("VALUE {key} 0 {}\r\n", v.len()).into_bytes();
                out.extend_from_slice(v);
                out.extend_from_slice(b"\r\nEND\r\n");
                out
            }
            None => b"END\r\n".to_vec(),
        },
        [cmd, key] if cmd == "delete" => match map.remove(key) {
            Some(_) => b"DELETED\r\n".to_vec(),
            None => b"NOT_FOUND\r\n".to_vec(),
        },
        _ => b"ERROR\r\n".to_vec(),
    }
}
