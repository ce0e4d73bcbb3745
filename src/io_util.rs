//! Small read helpers shared by the line reader, the frame decoder, and the
//! handshake's `Content-Length` body skip.
//!
//! `tokio-uring` hands buffers back and forth by value (the kernel needs to
//! own them for the duration of the operation), so every read here takes a
//! `Vec<u8>`, fills some of it, and hands it back; this is the same shape
//! as a plain `stream.read(buf).await` call.

use std::io;
use tokio_uring::net::TcpStream;

/// Read exactly `len` bytes from `stream`, looping over short reads.
/// A read returning 0 bytes before `len` is reached is reported as
/// `UnexpectedEof`, matching spec §4.F's "signals EOF if the underlying
/// stream ends before `length` is satisfied."
pub async fn read_exact(stream: &TcpStream, len: usize) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let remaining = len - out.len();
        let buf = vec![0u8; remaining];
        let (result, buf) = stream.read(buf).await;
        let n = result?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before expected bytes were read",
            ));
        }
        out.extend_from_slice(&buf[..n]);
    }
    Ok(out)
}

/// Discard exactly `len` bytes from `stream` (used to consume a
/// `Content-Length` handshake response body nobody wants).
pub async fn skip_exact(stream: &TcpStream, len: usize) -> io::Result<()> {
    if len == 0 {
        return Ok(());
    }
    read_exact(stream, len).await.map(|_| ())
}

/// Write the entire buffer, looping over short writes, then flush.
///
/// `tokio-uring` sockets have no separate flush step (writes are
/// submitted directly to the kernel), but we keep the name `write_all`
/// to mirror the encoder's documented "emit ... flush" contract.
pub async fn write_all(stream: &TcpStream, buf: Vec<u8>) -> io::Result<()> {
    let (result, _buf) = stream.write_all(buf).await;
    result
}
