//! # Cache Engine Trait
//!
//! Strategy-pattern seam between the protocol handler and the concrete
//! cache implementation, so the handler (and its tests) can be written
//! against a trait object instead of the real LRU/TTL machinery.

use std::sync::Arc;

use hkv_common::StatsSnapshot;

/// Operations a cache engine exposes to the protocol layer.
///
/// None of these fail at this layer: a missing key is a normal "absent"
/// result, not an error, and malformed commands are rejected earlier by
/// the protocol handler before the engine ever sees them.
pub trait KVEngine: Send + Sync {
    /// Looks up `key`, returning its value if live, or `None` on miss or expiry.
    fn get(&self, key: &str) -> Option<Arc<[u8]>>;

    /// Inserts or overwrites `key`. `ttl_ms == 0` means no expiry.
    fn set(&self, key: &str, value: Vec<u8>, ttl_ms: u64);

    /// Removes `key` if present, returning the number of entries removed (0 or 1).
    fn delete(&self, key: &str) -> u32;

    /// Returns a point-in-time snapshot of counters and gauges.
    fn stats(&self) -> StatsSnapshot;
}
