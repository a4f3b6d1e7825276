//! # Wire Encoding and Parsing
//!
//! Purpose: encode client commands and parse server responses for the
//! line-oriented cache protocol, without external dependencies.
//!
//! ## Design Principles
//! 1. **State-Free Parsing**: responses are parsed top-down with minimal state.
//! 2. **Buffer Reuse**: the caller provides buffers to avoid per-call allocations.
//! 3. **Binary-Safe**: `VALUE` payloads are treated as raw bytes.
//! 4. **Fail Fast**: invalid framing returns protocol errors immediately.

use std::io::BufRead;

use crate::client::{ClientError, ClientResult};

/// A parsed server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireResponse {
    /// `OK` following a `SET`.
    Ok,
    /// `VALUE <n>\n<bytes>\n` following a `GET` hit.
    Value(Vec<u8>),
    /// `NOT_FOUND` following a `GET` miss.
    NotFound,
    /// `DELETED <n>` following a `DEL`.
    Deleted(u32),
    /// `STATS <json>`, with the JSON payload kept as raw text.
    Stats(String),
    /// `ERR ...`.
    Err(String),
}

/// Encodes `SET <key> <ttl_ms> <nbytes>\n<value>\n`.
pub fn encode_set(key: &str, value: &[u8], ttl_ms: u64, out: &mut Vec<u8>) {
    out.extend_from_slice(b"SET ");
    out.extend_from_slice(key.as_bytes());
    out.push(b' ');
    out.extend_from_slice(ttl_ms.to_string().as_bytes());
    out.push(b' ');
    out.extend_from_slice(value.len().to_string().as_bytes());
    out.push(b'\n');
    out.extend_from_slice(value);
    out.push(b'\n');
}

/// Encodes `GET <key>\n`.
pub fn encode_get(key: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(b"GET ");
    out.extend_from_slice(key.as_bytes());
    out.push(b'\n');
}

/// Encodes `DEL <key>\n`.
pub fn encode_del(key: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(b"DEL ");
    out.extend_from_slice(key.as_bytes());
    out.push(b'\n');
}

/// Encodes `STATS\n`.
pub fn encode_stats(out: &mut Vec<u8>) {
    out.extend_from_slice(b"STATS\n");
}

/// Reads and parses one response from the buffered reader.
pub fn read_response<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> ClientResult<WireResponse> {
    read_line(reader, line_buf)?;
    if line_buf.is_empty() {
        return Err(ClientError::Protocol);
    }

    if line_buf == b"OK" {
        return Ok(WireResponse::Ok);
    }
    if line_buf == b"NOT_FOUND" {
        return Ok(WireResponse::NotFound);
    }
    if let Some(rest) = strip_prefix(line_buf, b"VALUE ") {
        let n = parse_usize(rest)?;
        let mut data = vec![0u8; n];
        reader.read_exact(&mut data)?;
        let mut trailing = [0u8; 1];
        reader.read_exact(&mut trailing)?;
        if trailing[0] != b'\n' {
            return Err(ClientError::Protocol);
        }
        return Ok(WireResponse::Value(data));
    }
    if let Some(rest) = strip_prefix(line_buf, b"DELETED ") {
        return Ok(WireResponse::Deleted(parse_usize(rest)? as u32));
    }
    if let Some(rest) = strip_prefix(line_buf, b"STATS ") {
        return Ok(WireResponse::Stats(String::from_utf8_lossy(rest).into_owned()));
    }
    if let Some(rest) = strip_prefix(line_buf, b"ERR") {
        return Ok(WireResponse::Err(String::from_utf8_lossy(rest).trim_start().to_string()));
    }
    Err(ClientError::Protocol)
}

fn strip_prefix<'a>(line: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    if line.len() >= prefix.len() && &line[..prefix.len()] == prefix {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> ClientResult<()> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Err(ClientError::Protocol);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    Ok(())
}

fn parse_usize(data: &[u8]) -> ClientResult<usize> {
    if data.is_empty() {
        return Err(ClientError::Protocol);
    }
    let mut value = 0usize;
    for &b in data {
        if !b.is_ascii_digit() {
            return Err(ClientError::Protocol);
        }
        value = value.saturating_mul(10).saturating_add((b - b'0') as usize);
    }
    Ok(value)
}
