//! # HybridKV Sync Client
//!
//! Provide a lightweight, synchronous client for the line-oriented cache
//! protocol, with connection pooling to minimize TCP handshake overhead.

mod client;
mod pool;
mod resp;

pub use client::{ClientConfig, ClientError, ClientResult, KVClient};
