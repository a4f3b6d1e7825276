// hkv-server - Protocol handler and connection host for the line-oriented
// cache protocol. Exposed as a library so integration tests can drive a
// real TCP listener end to end; `main.rs` is a thin CLI wrapper over it.

pub mod protocol;
pub mod server;
