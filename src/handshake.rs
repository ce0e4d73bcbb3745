//! Opening HTTP upgrade handshake (spec §4.E).
//!
//! Builds the client's upgrade request, sends it, then reads the response
//! line-by-line with [`crate::line_reader`] so that no byte past the blank
//! line terminator is ever buffered; those bytes belong to the first
//! WebSocket frame, not to us.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use tokio_uring::net::TcpStream;

use crate::error::WsError;
use crate::io_util::{skip_exact, write_all};
use crate::line_reader::read_line;

/// RFC 6455 §1.3 fixed GUID, concatenated onto the client's key before
/// hashing to produce the expected `Sec-WebSocket-Accept` value.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The parsed opening-handshake response: status, reason phrase, and
/// lower-cased header map. Exposed so a non-101 response can be reported
/// to the caller in full, per spec §4.E ("fails with a handshake error
/// carrying the full parsed response").
#[derive(Debug, Clone)]
pub struct HandshakeResponse {
    pub status_code: u16,
    pub reason: String,
    pub headers: HashMap<String, String>,
}

/// Generate a fresh `Sec-WebSocket-Key`: base64 of 16 random bytes.
fn generate_sec_key() -> Result<String, WsError> {
    let mut key = [0u8; 16];
    getrandom::fill(&mut key).map_err(|e| WsError::Handshake(format!("random source failed: {e}")))?;
    Ok(BASE64.encode(key))
}

/// Compute the expected `Sec-WebSocket-Accept` value from the client's key.
fn compute_accept_key(sec_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(sec_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

fn build_request(host: &str, port: u16, path: &str, sec_key: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Sec-WebSocket-Key: {sec_key}\r\n\
         Host: {host}:{port}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n"
    )
}

/// Parse a status line of the form `HTTP/1.1 101 Switching Protocols`.
fn parse_status_line(line: &str) -> Result<(u16, String), WsError> {
    let mut parts = line.splitn(3, ' ');
    let http_version = parts
        .next()
        .ok_or_else(|| WsError::handshake("empty status line"))?;
    if !http_version.starts_with("HTTP") {
        return Err(WsError::handshake(format!("not an HTTP status line: {line:?}")));
    }
    let code = parts
        .next()
        .ok_or_else(|| WsError::handshake(format!("missing status code: {line:?}")))?;
    let code: u16 = code
        .parse()
        .map_err(|_| WsError::handshake(format!("non-numeric status code: {code:?}")))?;
    let reason = parts.next().unwrap_or("").to_string();
    Ok((code, reason))
}

fn parse_header_line(line: &str) -> Option<(String, String)> {
    let (name, value) = line.split_once(':')?;
    Some((name.trim().to_ascii_lowercase(), value.trim().to_string()))
}

/// Run the client handshake over an already-connected TCP stream.
///
/// On success the stream is positioned exactly at the first byte after the
/// handshake (any `Content-Length` body has been consumed); the caller may
/// now start the framed receive loop on the same stream.
pub async fn perform(stream: &TcpStream, host: &str, port: u16, path: &str) -> Result<HandshakeResponse, WsError> {
    let sec_key = generate_sec_key()?;
    let request = build_request(host, port, path, &sec_key);
    log::debug!("sending WebSocket upgrade request to {host}:{port}{path}");
    write_all(stream, request.into_bytes()).await?;

    let status_line = read_line(stream).await?;
    let (status_code, reason) = parse_status_line(&status_line)?;

    let mut headers = HashMap::new();
    loop {
        let line = read_line(stream).await?;
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = parse_header_line(&line) {
            headers.insert(name, value);
        }
    }

    let response = HandshakeResponse {
        status_code,
        reason,
        headers,
    };

    if response.status_code != 101 {
        return Err(WsError::handshake(format!(
            "expected 101 Switching Protocols, got {} {} (headers: {:?})",
            response.status_code, response.reason, response.headers
        )));
    }

    let expected_accept = compute_accept_key(&sec_key);
    match response.headers.get("sec-websocket-accept") {
        Some(actual) if actual == &expected_accept => {}
        Some(actual) => {
            return Err(WsError::handshake(format!(
                "Sec-WebSocket-Accept mismatch: expected {expected_accept}, got {actual}"
            )))
        }
        None => return Err(WsError::handshake("missing Sec-WebSocket-Accept header")),
    }

    if let Some(len) = response.headers.get("content-length") {
        let len: usize = len
            .parse()
            .map_err(|_| WsError::handshake(format!("non-numeric Content-Length: {len:?}")))?;
        skip_exact(stream, len).await?;
    }

    log::debug!("WebSocket handshake complete");
    Ok(response)
}
