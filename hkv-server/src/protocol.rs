//! # Protocol Handler
//!
//! A pure state machine over a byte buffer: turns an inbound byte stream
//! into cache operations and textual responses, without ever touching a
//! socket. The host feeds it bytes through [`ProtocolHandler::on_data`]
//! and receives responses through an injected [`ResponseSink`]; this
//! keeps the parser trivially testable with synthetic byte sequences and
//! free of any particular I/O strategy.
//!
//! ## Wire grammar
//! ```text
//! SET <key> <ttl_ms> <nbytes>\n<payload bytes of length nbytes>\n
//! GET <key>\n
//! DEL <key>\n
//! STATS\n
//! ```

use std::str::SplitAsciiWhitespace;
use std::sync::Arc;

use bytes::{Buf, BytesMut};

use hkv_engine::KVEngine;

/// Destination for the bytes a [`ProtocolHandler`] writes in response to
/// input. Blanket-implemented for `FnMut(&[u8])` closures so callers can
/// pass one without defining a type.
pub trait ResponseSink {
    fn write(&mut self, data: &[u8]);
}

impl<F: FnMut(&[u8])> ResponseSink for F {
    fn write(&mut self, data: &[u8]) {
        (self)(data)
    }
}

enum ParseState {
    ReadLine,
    ReadValue {
        key: String,
        ttl_ms: u64,
        nbytes: usize,
    },
}

/// Per-connection parser. Not shared across threads: each handler's state
/// is touched by exactly one connection's thread, while the engine behind
/// it is shared by all of them.
pub struct ProtocolHandler<E: KVEngine> {
    engine: Arc<E>,
    buffer: BytesMut,
    state: ParseState,
}

impl<E: KVEngine> ProtocolHandler<E> {
    pub fn new(engine: Arc<E>) -> Self {
        ProtocolHandler {
            engine,
            buffer: BytesMut::new(),
            state: ParseState::ReadLine,
        }
    }

    /// Feeds newly-arrived bytes to the parser, synchronously executing
    /// every complete command found and writing its response to `sink`.
    /// Any unconsumed trailing bytes remain buffered for the next call,
    /// so the parser is reentrant across arbitrary socket fragmentation.
    pub fn on_data<S: ResponseSink>(&mut self, data: &[u8], sink: &mut S) {
        self.buffer.extend_from_slice(data);

        loop {
            match std::mem::replace(&mut self.state, ParseState::ReadLine) {
                ParseState::ReadLine => {
                    let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
                        break; // state already reset to ReadLine above
                    };
                    let raw_line = self.buffer.split_to(pos);
                    self.buffer.advance(1); // consume the '\n'
                    let line = String::from_utf8_lossy(&raw_line);
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    self.dispatch_line(trimmed, sink);
                }
                ParseState::ReadValue {
                    key,
                    ttl_ms,
                    nbytes,
                } => {
                    if self.buffer.len() < nbytes + 1 {
                        self.state = ParseState::ReadValue {
                            key,
                            ttl_ms,
                            nbytes,
                        };
                        break;
                    }
                    let payload = self.buffer.split_to(nbytes).to_vec();
                    let trailing = self.buffer[0];
                    self.buffer.advance(1);
                    if trailing != b'\n' {
                        sink.write(b"ERR protocol: missing newline after payload\n");
                    } else {
                        self.engine.set(&key, payload, ttl_ms);
                        sink.write(b"OK\n");
                    }
                    self.state = ParseState::ReadLine;
                }
            }
        }
    }

    fn dispatch_line<S: ResponseSink>(&mut self, line: &str, sink: &mut S) {
        let mut tokens = line.split_ascii_whitespace();
        let command = match tokens.next() {
            Some(command) => command,
            None => {
                sink.write(b"ERR unknown or invalid command\n");
                return;
            }
        };
        match command.to_ascii_uppercase().as_str() {
            "SET" => self.handle_set(tokens, sink),
            "GET" => Self::handle_get(&self.engine, tokens, sink),
            "DEL" => Self::handle_del(&self.engine, tokens, sink),
            "STATS" => Self::handle_stats(&self.engine, tokens, sink),
            _ => sink.write(b"ERR unknown or invalid command\n"),
        }
    }

    fn handle_set<S: ResponseSink>(&mut self, mut tokens: SplitAsciiWhitespace, sink: &mut S) {
        let key = tokens.next();
        let ttl_ms = tokens.next();
        let nbytes = tokens.next();
        let extra = tokens.next();
        let (key, ttl_ms, nbytes) = match (key, ttl_ms, nbytes, extra) {
            (Some(key), Some(ttl_ms), Some(nbytes), None) => (key, ttl_ms, nbytes),
            _ => {
                sink.write(b"ERR invalid SET args\n");
                return;
            }
        };
        let ttl_ms: u64 = match ttl_ms.parse() {
            Ok(value) => value,
            Err(_) => {
                sink.write(b"ERR invalid SET args\n");
                return;
            }
        };
        let nbytes: usize = match nbytes.parse() {
            Ok(value) => value,
            Err(_) => {
                sink.write(b"ERR invalid SET args\n");
                return;
            }
        };
        self.state = ParseState::ReadValue {
            key: key.to_string(),
            ttl_ms,
            nbytes,
        };
    }

    fn handle_get<S: ResponseSink>(engine: &Arc<E>, mut tokens: SplitAsciiWhitespace, sink: &mut S) {
        let key = tokens.next();
        let extra = tokens.next();
        let key = match (key, extra) {
            (Some(key), None) => key,
            _ => {
                sink.write(b"ERR unknown or invalid command\n");
                return;
            }
        };
        match engine.get(key) {
            Some(value) => {
                sink.write(format!("VALUE {}\n", value.len()).as_bytes());
                sink.write(&value);
                sink.write(b"\n");
            }
            None => sink.write(b"NOT_FOUND\n"),
        }
    }

    fn handle_del<S: ResponseSink>(engine: &Arc<E>, mut tokens: SplitAsciiWhitespace, sink: &mut S) {
        let key = tokens.next();
        let extra = tokens.next();
        let key = match (key, extra) {
            (Some(key), None) => key,
            _ => {
                sink.write(b"ERR unknown or invalid command\n");
                return;
            }
        };
        let removed = engine.delete(key);
        sink.write(format!("DELETED {removed}\n").as_bytes());
    }

    fn handle_stats<S: ResponseSink>(engine: &Arc<E>, mut tokens: SplitAsciiWhitespace, sink: &mut S) {
        if tokens.next().is_some() {
            sink.write(b"ERR unknown or invalid command\n");
            return;
        }
        let snapshot = engine.stats();
        sink.write(format!("STATS {}\n", snapshot.to_json()).as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hkv_engine::Cache;

    fn handler() -> ProtocolHandler<Cache> {
        ProtocolHandler::new(Cache::new(1024))
    }

    fn feed(handler: &mut ProtocolHandler<Cache>, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        handler.on_data(input, &mut |bytes: &[u8]| out.extend_from_slice(bytes));
        out
    }

    #[test]
    fn round_trip_scenario() {
        let mut handler = handler();
        assert_eq!(feed(&mut handler, b"SET greeting 3000 5\nhello\n"), b"OK\n");
        assert_eq!(feed(&mut handler, b"GET greeting\n"), b"VALUE 5\nhello\n");
        assert_eq!(feed(&mut handler, b"DEL greeting\n"), b"DELETED 1\n");
        assert_eq!(feed(&mut handler, b"GET greeting\n"), b"NOT_FOUND\n");
    }

    #[test]
    fn binary_safe_payload() {
        let mut handler = handler();
        let mut set_cmd = b"SET bin 0 3\n".to_vec();
        set_cmd.extend_from_slice(&[0x00, b'\n', 0x01]);
        set_cmd.push(b'\n');
        assert_eq!(feed(&mut handler, &set_cmd), b"OK\n");
        let mut expected = b"VALUE 3\n".to_vec();
        expected.extend_from_slice(&[0x00, b'\n', 0x01]);
        expected.push(b'\n');
        assert_eq!(feed(&mut handler, b"GET bin\n"), expected);
    }

    #[test]
    fn fragmented_input_one_byte_at_a_time_matches_single_shot() {
        let input = b"SET greeting 3000 5\nhello\nGET greeting\nDEL greeting\nGET greeting\n";
        let mut whole = handler();
        let whole_out = feed(&mut whole, input);

        let mut fragmented = handler();
        let mut fragmented_out = Vec::new();
        for byte in input {
            fragmented.on_data(&[*byte], &mut |bytes: &[u8]| fragmented_out.extend_from_slice(bytes));
        }
        assert_eq!(fragmented_out, whole_out);
    }

    #[test]
    fn framing_error_recovers_and_connection_stays_usable() {
        let mut handler = handler();
        let out = feed(&mut handler, b"SET k 0 3\nabcX");
        assert_eq!(out, b"ERR protocol: missing newline after payload\n");
        assert_eq!(feed(&mut handler, b"GET k\n"), b"NOT_FOUND\n");
    }

    #[test]
    fn lru_eviction_with_promotion() {
        let mut handler = ProtocolHandler::new(Cache::new(16));
        assert_eq!(feed(&mut handler, b"SET a 0 1\nx\n"), b"OK\n");
        assert_eq!(feed(&mut handler, b"SET b 0 1\nx\n"), b"OK\n");
        assert_eq!(feed(&mut handler, b"GET a\n"), b"VALUE 1\nx\n");
        assert_eq!(feed(&mut handler, b"SET c 0 12\nxxxxxxxxxxxx\n"), b"OK\n");
        assert_eq!(feed(&mut handler, b"GET b\n"), b"NOT_FOUND\n");
        assert_eq!(feed(&mut handler, b"GET a\n"), b"VALUE 1\nx\n");
    }

    #[test]
    fn unknown_command_is_rejected() {
        let mut handler = handler();
        assert_eq!(feed(&mut handler, b"NOPE\n"), b"ERR unknown or invalid command\n");
    }

    #[test]
    fn set_with_wrong_arity_is_rejected() {
        let mut handler = handler();
        assert_eq!(feed(&mut handler, b"SET onlykey\n"), b"ERR invalid SET args\n");
    }

    #[test]
    fn set_with_non_numeric_ttl_is_rejected() {
        let mut handler = handler();
        assert_eq!(feed(&mut handler, b"SET k abc 1\n"), b"ERR invalid SET args\n");
    }

    #[test]
    fn blank_lines_between_commands_are_skipped() {
        let mut handler = handler();
        assert_eq!(feed(&mut handler, b"\n\nGET missing\n"), b"NOT_FOUND\n");
    }

    #[test]
    fn stats_reports_compact_json() {
        let mut handler = handler();
        let out = feed(&mut handler, b"STATS\n");
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("STATS {"));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn command_keyword_is_case_insensitive() {
        let mut handler = handler();
        assert_eq!(feed(&mut handler, b"set k 0 1\nx\n"), b"OK\n");
        assert_eq!(feed(&mut handler, b"get k\n"), b"VALUE 1\nx\n");
    }
}
