// hkv-engine - The cache engine: a byte-bounded, LRU-evicted, TTL-expiring
// in-memory key-value store behind the `KVEngine` trait.

pub mod cache;
pub mod engine;

pub use cache::Cache;
pub use engine::KVEngine;
