//! # Synchronous Client API
//!
//! Purpose: expose a compact, blocking API for issuing commands to the
//! HybridKV server over its line-oriented wire protocol.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `KVClient` hides pooling and protocol details.
//! 2. **Borrow-Friendly API**: accepts `&str`/`&[u8]` to avoid unnecessary copies.
//! 3. **Fail Fast**: protocol violations surface immediately as errors.
//! 4. **Performance First**: prefers direct TCP writes and buffer reuse.

use std::fmt;
use std::time::Duration;

use crate::pool::{ConnectionPool, PoolConfig};
use crate::resp::{encode_del, encode_get, encode_set, encode_stats, WireResponse};

/// Result type for the sync client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the sync client.
#[derive(Debug)]
pub enum ClientError {
    /// Network or IO failure while reading/writing.
    Io(std::io::Error),
    /// Wire framing or parse error.
    Protocol,
    /// Server returned an `ERR ...` reply.
    Server { message: String },
    /// Response type did not match the expected command response.
    UnexpectedResponse,
    /// Pool is at capacity and no idle connections are available.
    PoolExhausted,
    /// Address could not be parsed into a socket address.
    InvalidAddress,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Io(err) => write!(f, "io error: {}", err),
            ClientError::Protocol => write!(f, "protocol error"),
            ClientError::Server { message } => write!(f, "server error: {message}"),
            ClientError::UnexpectedResponse => write!(f, "unexpected response"),
            ClientError::PoolExhausted => write!(f, "connection pool exhausted"),
            ClientError::InvalidAddress => write!(f, "invalid address"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err)
    }
}

/// Configuration for the synchronous client and its pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address, e.g. "127.0.0.1:9000".
    pub addr: String,
    /// Maximum idle connections kept in the pool.
    pub max_idle: usize,
    /// Maximum total connections (idle + in-use).
    pub max_total: usize,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: "127.0.0.1:9000".to_string(),
            max_idle: 8,
            max_total: 16,
            read_timeout: None,
            write_timeout: None,
            connect_timeout: None,
        }
    }
}

/// Synchronous client with connection pooling.
///
/// This is a facade over the pool and wire encoder/decoder. Each call
/// acquires a connection, executes one command, and returns the
/// connection to the pool.
pub struct KVClient {
    pool: ConnectionPool,
}

impl KVClient {
    /// Creates a client with default configuration.
    pub fn connect(addr: impl Into<String>) -> ClientResult<Self> {
        let mut config = ClientConfig::default();
        config.addr = addr.into();
        Self::with_config(config)
    }

    /// Creates a client with a custom configuration.
    pub fn with_config(config: ClientConfig) -> ClientResult<Self> {
        let pool = ConnectionPool::new(PoolConfig {
            addr: config.addr,
            max_idle: config.max_idle,
            max_total: config.max_total,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            connect_timeout: config.connect_timeout,
        })?;
        Ok(KVClient { pool })
    }

    /// Fetches a value by key. Returns `Ok(None)` when the key is missing.
    pub fn get(&self, key: &str) -> ClientResult<Option<Vec<u8>>> {
        let mut request = Vec::with_capacity(key.len() + 8);
        encode_get(key, &mut request);
        let mut conn = self.pool.acquire()?;
        match conn.exec(&request)? {
            WireResponse::Value(data) => Ok(Some(data)),
            WireResponse::NotFound => Ok(None),
            WireResponse::Err(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Sets a value for a key without expiration.
    pub fn set(&self, key: &str, value: &[u8]) -> ClientResult<()> {
        self.set_with_ttl_ms(key, value, 0)
    }

    /// Sets a value and attaches an expiration.
    pub fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> ClientResult<()> {
        self.set_with_ttl_ms(key, value, ttl.as_millis() as u64)
    }

    fn set_with_ttl_ms(&self, key: &str, value: &[u8], ttl_ms: u64) -> ClientResult<()> {
        let mut request = Vec::with_capacity(key.len() + value.len() + 24);
        encode_set(key, value, ttl_ms, &mut request);
        let mut conn = self.pool.acquire()?;
        match conn.exec(&request)? {
            WireResponse::Ok => Ok(()),
            WireResponse::Err(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Deletes a key. Returns true when a key was removed.
    pub fn delete(&self, key: &str) -> ClientResult<bool> {
        let mut request = Vec::with_capacity(key.len() + 8);
        encode_del(key, &mut request);
        let mut conn = self.pool.acquire()?;
        match conn.exec(&request)? {
            WireResponse::Deleted(count) => Ok(count > 0),
            WireResponse::Err(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Fetches the server's stats snapshot as its raw compact-JSON text.
    pub fn stats(&self) -> ClientResult<String> {
        let mut request = Vec::with_capacity(8);
        encode_stats(&mut request);
        let mut conn = self.pool.acquire()?;
        match conn.exec(&request)? {
            WireResponse::Stats(json) => Ok(json),
            WireResponse::Err(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}
