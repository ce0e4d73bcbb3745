//! A minimal, Autobahn-conformant client-side implementation of the
//! WebSocket protocol (RFC 6455, version 13) over a plain TCP stream.
//!
//! This crate performs the opening HTTP upgrade handshake, then reads and
//! writes framed messages, text, binary, ping, pong, close, until the
//! connection terminates. It does not implement TLS, the server role,
//! permessage-deflate or any other extension, or subprotocol negotiation
//! beyond echoing protocol version 13.
//!
//! The background receive loop and all socket I/O run on `tokio-uring`;
//! callers drive the crate from inside `tokio_uring::start(async { ... })`.
//!
//! ```no_run
//! tokio_uring::start(async {
//!     let config = wsclient::ClientConfig::new("echo.websocket.org", 80, "/");
//!     let client = wsclient::open(config, |event, _client| {
//!         match event {
//!             wsclient::Event::Text(text) => {
//!                 println!("received: {text}");
//!             }
//!             wsclient::Event::Close(outcome) => {
//!                 println!("closed: {outcome:?}");
//!             }
//!             _ => {}
//!         }
//!     })
//!     .await
//!     .unwrap();
//!
//!     client.send_text("hello").await.unwrap();
//! });
//! ```

mod bits;
mod mask;
mod utf8;
mod io_util;
mod line_reader;
mod handshake;

pub mod error;
pub mod frame;
pub mod receive_loop;
pub mod client;

pub use client::{open, ClientConfig, ClientHandle, CloseOutcome};
pub use error::WsError;
pub use frame::{Frame, Opcode};
pub use receive_loop::Event;
