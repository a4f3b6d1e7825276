//! # Cache Stats Snapshot
//!
//! Purpose: a plain, serializable snapshot of cache counters and gauges,
//! shared between the engine (which produces it under its guard) and the
//! protocol handler (which renders it as compact JSON for `STATS`).
//!
//! ## Design Principles
//! 1. **By-Value Copy**: the snapshot owns its data so callers can hold it
//!    past the engine's lock without extending the critical section.
//! 2. **Stable Field Set**: field names match the wire schema exactly so
//!    `serde_json` needs no renaming.

use serde::Serialize;

/// Point-in-time snapshot of cache counters and gauges.
///
/// Field order is not contractual; `serde_json::to_string` emits a compact
/// object with exactly these keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Current number of live entries.
    pub keys: u64,
    /// Current total bytes consumed by live entries.
    pub bytes: u64,
    /// Configured byte capacity.
    pub capacity: u64,
    /// Cumulative `GET` hits.
    pub hits: u64,
    /// Cumulative `GET` misses (including expired reads).
    pub misses: u64,
    /// Cumulative `SET` operations.
    pub sets: u64,
    /// Cumulative capacity evictions.
    pub evictions: u64,
    /// Cumulative TTL expirations (lazy + swept).
    pub expired: u64,
}

impl StatsSnapshot {
    /// Encodes the snapshot as compact JSON matching the wire schema.
    ///
    /// `serde_json::to_string` never fails for this plain-data struct, so
    /// this unwraps rather than threading a `Result` through the hot path.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("StatsSnapshot serializes infallibly")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_has_exact_key_set() {
        let snapshot = StatsSnapshot {
            keys: 1,
            bytes: 2,
            capacity: 3,
            hits: 4,
            misses: 5,
            sets: 6,
            evictions: 7,
            expired: 8,
        };
        let json = snapshot.to_json();
        assert!(!json.contains(' '), "encoding must be compact: {json}");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let obj = value.as_object().unwrap();
        let expected: std::collections::BTreeSet<&str> = [
            "keys", "bytes", "capacity", "hits", "misses", "sets", "evictions", "expired",
        ]
        .into_iter()
        .collect();
        let actual: std::collections::BTreeSet<&str> =
            obj.keys().map(|k| k.as_str()).collect();
        assert_eq!(actual, expected);
    }
}
