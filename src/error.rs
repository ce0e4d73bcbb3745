//! Crate-level error type.
//!
//! Kinds map 1:1 onto spec §7: transport failure, handshake rejection,
//! protocol violation (carrying the close status code the peer must be
//! told), and caller usage errors.

use thiserror::Error;

/// Close status code 1002: generic protocol error.
pub const STATUS_PROTOCOL_ERROR: u16 = 1002;
/// Close status code 1007: invalid payload data (non-UTF-8 text).
pub const STATUS_INVALID_PAYLOAD: u16 = 1007;

#[derive(Error, Debug)]
pub enum WsError {
    /// EOF or I/O failure while reading or writing the socket.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The opening handshake did not complete: non-101 status, an
    /// unparseable status line, or a mismatched Sec-WebSocket-Accept.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// A frame or sequence of frames violated a framing invariant. Carries
    /// the close status code the peer must be told.
    #[error("protocol violation ({status_code}): {message}")]
    Protocol { status_code: u16, message: String },

    /// The caller misused the client facade (e.g. `emit` after close).
    #[error("usage error: {0}")]
    Usage(String),
}

impl WsError {
    pub fn protocol(message: impl Into<String>) -> Self {
        WsError::Protocol {
            status_code: STATUS_PROTOCOL_ERROR,
            message: message.into(),
        }
    }

    pub fn invalid_utf8() -> Self {
        WsError::Protocol {
            status_code: STATUS_INVALID_PAYLOAD,
            message: "invalid UTF-8 in text payload".into(),
        }
    }

    pub fn handshake(message: impl Into<String>) -> Self {
        WsError::Handshake(message.into())
    }

    pub fn usage(message: impl Into<String>) -> Self {
        WsError::Usage(message.into())
    }

    /// The close status code this error implies, if it's a protocol
    /// violation the receive loop must report to the peer.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            WsError::Protocol { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}
