//! memcached backend over the text protocol.
//!
//! One [`MemcacheStore`] owns one TCP connection to one memcached process.
//! Requests are serialized through a mutex, so operations against the same
//! backend are applied in the order they were issued. A connection that
//! fails mid-request is dropped and re-opened on the next call.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use memring_types::NodeAddr;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream,
};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{KvStore, StoreConnector};

/// Longest key memcached accepts.
pub const MAX_KEY_LEN: usize = 250;

/// Largest value accepted in a `get` reply: memcached's default item size.
pub const MAX_VALUE_LEN: usize = 1024 * 1024;

/// Check that `key` can be sent over the text protocol: 1 to 250 bytes,
/// no whitespace or control characters.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad_byte = key.bytes().any(|b| b <= b' ' || b == 0x7f);
    if key.is_empty() || key.len() > MAX_KEY_LEN || bad_byte {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

struct Connection {
    stream: Option<BufStream<TcpStream>>,
    closed: bool,
}

/// A memcached backend reached over TCP.
pub struct MemcacheStore {
    addr: NodeAddr,
    io_timeout: Option<Duration>,
    conn: Mutex<Connection>,
}

impl MemcacheStore {
    /// Connect to the memcached process at `addr`.
    ///
    /// `io_timeout` bounds the connect and every later request.
    pub async fn connect(
        addr: NodeAddr,
        io_timeout: Option<Duration>,
    ) -> Result<Self, StoreError> {
        let stream = open(&addr, io_timeout).await?;
        Ok(Self {
            addr,
            io_timeout,
            conn: Mutex::new(Connection {
                stream: Some(stream),
                closed: false,
            }),
        })
    }

    /// The backend address.
    pub fn addr(&self) -> &NodeAddr {
        &self.addr
    }

    /// Run one request/reply exchange on the connection.
    async fn call(&self, request: Request<'_>) -> Result<Reply, StoreError> {
        let mut conn = self.conn.lock().await;
        if conn.closed {
            return Err(StoreError::Closed(self.addr.clone()));
        }

        let mut stream = match conn.stream.take() {
            Some(stream) => stream,
            None => open(&self.addr, self.io_timeout).await?,
        };

        let result = match self.io_timeout {
            Some(after) => tokio::time::timeout(after, exchange(&mut stream, &self.addr, &request))
                .await
                .unwrap_or_else(|_| {
                    Err(StoreError::Timeout {
                        addr: self.addr.clone(),
                        after,
                    })
                }),
            None => exchange(&mut stream, &self.addr, &request).await,
        };

        if result.is_ok() {
            conn.stream = Some(stream);
        } else {
            debug!(addr = %self.addr, "dropping backend connection after failed request");
        }
        result
    }
}

#[async_trait::async_trait]
impl KvStore for MemcacheStore {
    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        validate_key(key)?;
        match self.call(Request::Set { key, value: &value }).await? {
            Reply::Stored => Ok(()),
            _ => Err(protocol_error(&self.addr, "mismatched reply to set")),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        validate_key(key)?;
        match self.call(Request::Get { key }).await? {
            Reply::Value(value) => Ok(value),
            _ => Err(protocol_error(&self.addr, "mismatched reply to get")),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        match self.call(Request::Delete { key }).await? {
            Reply::Deleted => Ok(()),
            _ => Err(protocol_error(&self.addr, "mismatched reply to delete")),
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        conn.closed = true;
        if let Some(mut stream) = conn.stream.take() {
            stream.write_all(b"quit\r\n").await?;
            stream.flush().await?;
            stream.get_mut().shutdown().await?;
            debug!(addr = %self.addr, "closed backend connection");
        }
        Ok(())
    }
}

/// Connector opening a [`MemcacheStore`] per node.
#[derive(Debug, Clone, Default)]
pub struct MemcacheConnector {
    io_timeout: Option<Duration>,
}

impl MemcacheConnector {
    /// Create a connector; `io_timeout` applies to every backend it opens.
    pub fn new(io_timeout: Option<Duration>) -> Self {
        Self { io_timeout }
    }
}

#[async_trait::async_trait]
impl StoreConnector for MemcacheConnector {
    async fn connect(&self, addr: &NodeAddr) -> Result<Arc<dyn KvStore>, StoreError> {
        let store = MemcacheStore::connect(addr.clone(), self.io_timeout).await?;
        Ok(Arc::new(store))
    }
}

// ---------------------------------------------------------------------------
// Wire protocol
// ---------------------------------------------------------------------------

enum Request<'a> {
    Set { key: &'a str, value: &'a Bytes },
    Get { key: &'a str },
    Delete { key: &'a str },
}

enum Reply {
    Stored,
    Value(Option<Bytes>),
    Deleted,
}

async fn open(
    addr: &NodeAddr,
    io_timeout: Option<Duration>,
) -> Result<BufStream<TcpStream>, StoreError> {
    let connect = TcpStream::connect((addr.host(), addr.port()));
    let stream = match io_timeout {
        Some(after) => tokio::time::timeout(after, connect)
            .await
            .map_err(|_| StoreError::Timeout {
                addr: addr.clone(),
                after,
            })?,
        None => connect.await,
    }
    .map_err(|source| StoreError::Connect {
        addr: addr.clone(),
        source,
    })?;
    stream.set_nodelay(true)?;
    debug!(%addr, "connected to memcached");
    Ok(BufStream::new(stream))
}

async fn exchange<S>(
    stream: &mut S,
    addr: &NodeAddr,
    request: &Request<'_>,
) -> Result<Reply, StoreError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    match request {
        Request::Set { key, value } => {
            let header = format!("set {key} 0 0 {}\r\n", value.len());
            stream.write_all(header.as_bytes()).await?;
            stream.write_all(&value[..]).await?;
            stream.write_all(b"\r\n").await?;
            stream.flush().await?;

            let line = read_line(stream, addr).await?;
            match line.as_str() {
                "STORED" => Ok(Reply::Stored),
                other => Err(protocol_error(addr, format!("set {key}: {other}"))),
            }
        }
        Request::Get { key } => {
            stream.write_all(format!("get {key}\r\n").as_bytes()).await?;
            stream.flush().await?;

            let line = read_line(stream, addr).await?;
            if line == "END" {
                return Ok(Reply::Value(None));
            }
            let len = parse_value_header(&line, key, addr)?;

            let block = len
                .checked_add(2)
                .ok_or_else(|| protocol_error(addr, format!("value length {len} overflows")))?;
            let mut data = vec![0u8; block];
            stream.read_exact(&mut data).await?;
            if !data.ends_with(b"\r\n") {
                return Err(protocol_error(addr, "value block not terminated by CRLF"));
            }
            data.truncate(len);

            let end = read_line(stream, addr).await?;
            if end != "END" {
                return Err(protocol_error(addr, format!("expected END, got {end:?}")));
            }
            Ok(Reply::Value(Some(Bytes::from(data))))
        }
        Request::Delete { key } => {
            stream.write_all(format!("delete {key}\r\n").as_bytes()).await?;
            stream.flush().await?;

            let line = read_line(stream, addr).await?;
            match line.as_str() {
                "DELETED" | "NOT_FOUND" => Ok(Reply::Deleted),
                other => Err(protocol_error(addr, format!("delete {key}: {other}"))),
            }
        }
    }
}

/// Read one `\r\n`-terminated reply line, without the terminator.
async fn read_line<S>(stream: &mut S, addr: &NodeAddr) -> Result<String, StoreError>
where
    S: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if stream.read_line(&mut line).await? == 0 {
        return Err(protocol_error(addr, "connection closed by backend"));
    }
    match line.strip_suffix("\r\n") {
        Some(stripped) => Ok(stripped.to_string()),
        None => Err(protocol_error(addr, format!("unterminated reply {line:?}"))),
    }
}

/// Parse `VALUE <key> <flags> <bytes> [<cas>]` and return `<bytes>`.
///
/// Lengths above [`MAX_VALUE_LEN`] are refused before anything is allocated.
fn parse_value_header(line: &str, key: &str, addr: &NodeAddr) -> Result<usize, StoreError> {
    let mut parts = line.split(' ');
    let len = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("VALUE"), Some(k), Some(_flags), Some(len)) if k == key => len
            .parse::<usize>()
            .map_err(|_| protocol_error(addr, format!("bad value length in {line:?}")))?,
        _ => return Err(protocol_error(addr, format!("unexpected reply {line:?}"))),
    };
    if len > MAX_VALUE_LEN {
        return Err(protocol_error(
            addr,
            format!("value length {len} exceeds {MAX_VALUE_LEN}"),
        ));
    }
    Ok(len)
}

fn protocol_error(addr: &NodeAddr, message: impl Into<String>) -> StoreError {
    StoreError::Protocol {
        addr: addr.clone(),
        message: message.into(),
    }
}
