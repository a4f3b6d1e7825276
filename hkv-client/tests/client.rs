use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use hkv_client::{ClientConfig, KVClient};

fn spawn_server(expected_commands: usize, handler: fn(usize, Vec<u8>, &mut TcpStream)) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        for idx in 0..expected_commands {
            let line = read_command(&mut reader).expect("read command");
            handler(idx, line, &mut stream);
        }
    });

    addr
}

fn read_command_line(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<u8>> {
    let mut line = Vec::new();
    let bytes = reader.read_until(b'\n', &mut line)?;
    if bytes == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"));
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    Ok(line)
}

/// Reads one full command line and, for `SET`, also drains its payload so
/// the next `read_command` call starts at the next command rather than at
/// leftover payload bytes.
fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<u8>> {
    let line = read_command_line(reader)?;
    if line.starts_with(b"SET ") {
        let text = String::from_utf8_lossy(&line);
        let nbytes: usize = text
            .rsplit(' ')
            .next()
            .and_then(|tok| tok.parse().ok())
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "bad nbytes"))?;
        read_payload(reader, nbytes)?;
    }
    Ok(line)
}

fn read_payload(reader: &mut BufReader<TcpStream>, nbytes: usize) -> std::io::Result<Vec<u8>> {
    let mut data = vec![0u8; nbytes];
    reader.read_exact(&mut data)?;
    let mut trailing = [0u8; 1];
    reader.read_exact(&mut trailing)?;
    Ok(data)
}

fn write_line(stream: &mut TcpStream, line: &str) {
    let _ = stream.write_all(line.as_bytes());
    let _ = stream.write_all(b"\n");
    let _ = stream.flush();
}

fn write_value(stream: &mut TcpStream, data: &[u8]) {
    let _ = stream.write_all(format!("VALUE {}\n", data.len()).as_bytes());
    let _ = stream.write_all(data);
    let _ = stream.write_all(b"\n");
    let _ = stream.flush();
}

fn client_with_addr(addr: String) -> KVClient {
    let config = ClientConfig {
        addr,
        max_idle: 1,
        max_total: 1,
        read_timeout: Some(Duration::from_secs(1)),
        write_timeout: Some(Duration::from_secs(1)),
        connect_timeout: Some(Duration::from_secs(1)),
    };
    KVClient::with_config(config).expect("client")
}

#[test]
fn client_set_get_roundtrip() {
    let addr = spawn_server(2, |idx, line, stream| {
        if idx == 0 {
            let text = String::from_utf8(line).unwrap();
            assert!(text.starts_with("SET key 0 5"));
            write_line(stream, "OK");
        } else {
            assert_eq!(line, b"GET key");
            write_value(stream, b"value");
        }
    });

    let client = client_with_addr(addr);
    client.set("key", b"value").expect("set");
    let value = client.get("key").expect("get");
    assert_eq!(value, Some(b"value".to_vec()));
}

#[test]
fn client_get_miss_returns_none() {
    let addr = spawn_server(1, |_, line, stream| {
        assert_eq!(line, b"GET missing");
        write_line(stream, "NOT_FOUND");
    });

    let client = client_with_addr(addr);
    assert_eq!(client.get("missing").expect("get"), None);
}

#[test]
fn client_delete_reports_removal_count() {
    let addr = spawn_server(1, |_, line, stream| {
        assert_eq!(line, b"DEL key");
        write_line(stream, "DELETED 1");
    });

    let client = client_with_addr(addr);
    assert!(client.delete("key").expect("delete"));
}

#[test]
fn client_stats_returns_raw_json() {
    let addr = spawn_server(1, |_, line, stream| {
        assert_eq!(line, b"STATS");
        write_line(stream, "STATS {\"keys\":0,\"bytes\":0}");
    });

    let client = client_with_addr(addr);
    let json = client.stats().expect("stats");
    assert_eq!(json, "{\"keys\":0,\"bytes\":0}");
}

#[test]
fn client_set_with_ttl_sends_nonzero_ttl_ms() {
    let addr = spawn_server(1, |_, line, stream| {
        let text = String::from_utf8(line).unwrap();
        let mut tokens = text.split(' ');
        assert_eq!(tokens.next(), Some("SET"));
        assert_eq!(tokens.next(), Some("k"));
        assert_eq!(tokens.next(), Some("5000"));
        write_line(stream, "OK");
    });

    let client = client_with_addr(addr);
    client
        .set_with_ttl("k", b"v", Duration::from_secs(5))
        .expect("set_with_ttl");
}

#[test]
fn client_surfaces_server_errors() {
    let addr = spawn_server(1, |_, line, stream| {
        assert!(line.starts_with(b"GET "));
        write_line(stream, "ERR unknown or invalid command");
    });

    let client = client_with_addr(addr);
    // Forcing a malformed-looking request is not expressible via the typed
    // API, so this test exercises the error path via a handler that always
    // answers with an ERR response regardless of what was actually sent.
    let err = client.get("anything").unwrap_err();
    match err {
        hkv_client::ClientError::Server { message } => {
            assert_eq!(message, "unknown or invalid command");
        }
        other => panic!("expected Server error, got {other:?}"),
    }
}

#[test]
#[allow(unused_variables)]
fn payload_helper_reads_exact_bytes() {
    // Exercises read_payload indirectly through the server-side fixtures
    // above; kept as a narrow smoke test for the helper's byte accounting.
    let addr = spawn_server(1, |_, line, stream| {
        assert_eq!(line, b"GET k");
        write_value(stream, b"abc");
    });
    let client = client_with_addr(addr);
    assert_eq!(client.get("k").expect("get"), Some(b"abc".to_vec()));
}
