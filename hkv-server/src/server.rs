//! # Connection Host
//!
//! Accepts TCP connections and feeds inbound bytes to a fresh
//! [`ProtocolHandler`] per connection, all sharing one cache engine.
//!
//! Thread-per-connection rather than an event loop: the protocol handler
//! is a pure state machine with no opinion on I/O strategy, and a
//! blocking-thread host is the simplest one that drives it correctly.

use std::io::{BufWriter, ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use hkv_engine::Cache;
use tracing::{debug, info, warn};

use crate::protocol::ProtocolHandler;

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Runs the accept loop until the listener errors out or is closed.
/// Each accepted connection is handed its own thread; connection errors
/// terminate only that connection.
pub fn serve(listener: TcpListener, cache: Arc<Cache>) -> std::io::Result<()> {
    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "failed to accept connection");
                continue;
            }
        };
        let cache = Arc::clone(&cache);
        thread::spawn(move || handle_connection(stream, cache));
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, cache: Arc<Cache>) {
    let peer = stream.peer_addr().ok();
    if let Err(err) = stream.set_nodelay(true) {
        warn!(?peer, error = %err, "failed to set TCP_NODELAY");
    }

    let write_half = match stream.try_clone() {
        Ok(write_half) => write_half,
        Err(err) => {
            warn!(?peer, error = %err, "failed to clone connection for writes");
            return;
        }
    };
    let mut writer = BufWriter::new(write_half);
    let mut handler = ProtocolHandler::new(cache);
    let mut read_buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let bytes_read = match stream.read(&mut read_buf) {
            Ok(0) => break, // peer closed
            Ok(n) => n,
            Err(ref err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!(?peer, error = %err, "connection read error");
                break;
            }
        };

        let mut write_err = None;
        handler.on_data(&read_buf[..bytes_read], &mut |bytes: &[u8]| {
            if write_err.is_some() {
                return;
            }
            if let Err(err) = writer.write_all(bytes) {
                write_err = Some(err);
            }
        });
        if write_err.is_none() {
            if let Err(err) = writer.flush() {
                write_err = Some(err);
            }
        }
        if let Some(err) = write_err {
            debug!(?peer, error = %err, "connection write error");
            break;
        }
    }
    info!(?peer, "connection closed");
}
