//! HTTP line reader (spec §4.D).
//!
//! Reads one byte at a time until a `\n`, returning everything before it.
//! This exists only because the upgrade response is immediately followed
//! by binary WebSocket frames on the same stream: any reader that buffers
//! ahead past the blank-line terminator would steal bytes belonging to the
//! first frame.

use std::io;
use tokio_uring::net::TcpStream;

use crate::io_util::read_exact;

/// Read one CRLF- or LF-terminated line (the trailing `\r`, if present, is
/// stripped along with the `\n`). EOF before a `\n` is fatal.
pub async fn read_line(stream: &TcpStream) -> io::Result<String> {
    let mut bytes = Vec::new();
    loop {
        let chunk = read_exact(stream, 1).await?;
        let byte = chunk[0];
        if byte == b'\n' {
            break;
        }
        bytes.push(byte);
        log::trace!("handshake: read byte {:#04x}", byte);
    }
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    String::from_utf8(bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
