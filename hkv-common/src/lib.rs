// hkv-common - Shared types for HybridKV: the stats snapshot exchanged
// between the cache engine and the protocol handler.

pub mod stats;

pub use stats::StatsSnapshot;
