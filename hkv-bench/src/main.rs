//! # Wire-Level Benchmark
//!
//! Purpose: measure end-to-end SET/GET throughput against a running
//! `hkv-server` instance over the real wire protocol, the way an actual
//! client sees it — connection pooling, encoding, and all.
//!
//! ## Design Principles
//! 1. **Real Wire Path**: drives the server through `hkv-client`, not the
//!    engine directly, so the numbers include parsing and I/O overhead.
//! 2. **Single Connection Per Phase**: avoids pool contention from
//!    skewing the measured rate.
//! 3. **Dependency-Free CLI**: no CLI-parsing crate, matching the rest of
//!    this workspace's binaries.

use std::env;
use std::time::{Duration, Instant};

use hkv_client::{ClientConfig, KVClient};

struct BenchConfig {
    n: usize,
    host: String,
    port: u16,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut n = 10_000usize;
        let mut host = "127.0.0.1".to_string();
        let mut port = 9000u16;

        let mut args = env::args().skip(1);
        while let Some(flag) = args.next() {
            match flag.as_str() {
                "--n" => {
                    if let Some(value) = args.next().and_then(|v| v.parse().ok()) {
                        n = value;
                    }
                }
                "--host" => {
                    if let Some(value) = args.next() {
                        host = value;
                    }
                }
                "--port" => {
                    if let Some(value) = args.next().and_then(|v| v.parse().ok()) {
                        port = value;
                    }
                }
                _ => {}
            }
        }

        BenchConfig { n, host, port }
    }
}

fn report(label: &str, n: usize, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (n as f64) / secs;
    println!("{label}: {n} ops in {secs:.2}s -> {ops_per_sec:.0} ops/s");
}

fn bench_set(client: &KVClient, n: usize) -> Duration {
    let payload = b"value";
    let start = Instant::now();
    for i in 0..n {
        let key = format!("k{i}");
        client.set(&key, payload).expect("set");
    }
    start.elapsed()
}

fn bench_get(client: &KVClient, n: usize) -> Duration {
    let start = Instant::now();
    for i in 0..n {
        let key = format!("k{i}");
        client.get(&key).expect("get");
    }
    start.elapsed()
}

fn main() {
    let config = BenchConfig::from_args();
    let client = KVClient::with_config(ClientConfig {
        addr: format!("{}:{}", config.host, config.port),
        max_idle: 1,
        max_total: 1,
        ..ClientConfig::default()
    })
    .expect("connect to hkv-server");

    let set_elapsed = bench_set(&client, config.n);
    let get_elapsed = bench_get(&client, config.n);

    report("SET", config.n, set_elapsed);
    report("GET", config.n, get_elapsed);
}
