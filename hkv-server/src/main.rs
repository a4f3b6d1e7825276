//! # HybridKV Server
//!
//! Binds a TCP listener and serves the line-oriented cache protocol
//! against a single [`Cache`] shared by every connection.

use std::env;
use std::net::TcpListener;

use anyhow::{bail, Context, Result};
use hkv_engine::Cache;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hkv_server::server;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 9000;
const DEFAULT_CAPACITY_MB: u64 = 64;

struct Config {
    host: String,
    port: u16,
    capacity_mb: u64,
}

impl Config {
    fn from_args() -> Result<Self> {
        let mut host = DEFAULT_HOST.to_string();
        let mut port = DEFAULT_PORT;
        let mut capacity_mb = DEFAULT_CAPACITY_MB;

        let mut args = env::args().skip(1);
        while let Some(flag) = args.next() {
            match flag.as_str() {
                "--host" => host = args.next().context("--host requires a value")?,
                "--port" => {
                    let raw = args.next().context("--port requires a value")?;
                    port = raw.parse().context("--port must be a valid port number")?;
                }
                "--capacity-mb" => {
                    let raw = args.next().context("--capacity-mb requires a value")?;
                    capacity_mb = raw
                        .parse()
                        .context("--capacity-mb must be a non-negative integer")?;
                }
                other => bail!("unrecognized argument: {other}"),
            }
        }

        Ok(Config {
            host,
            port,
            capacity_mb,
        })
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    init_logging();
    let config = Config::from_args()?;
    let capacity_bytes = (config.capacity_mb as usize) * 1024 * 1024;

    let cache = Cache::new(capacity_bytes);
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?;

    info!(
        host = %config.host,
        port = config.port,
        capacity_mb = config.capacity_mb,
        "hkv-server listening"
    );

    server::serve(listener, cache)?;
    Ok(())
}
