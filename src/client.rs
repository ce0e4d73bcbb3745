//! Client facade (spec §4.J): `open`/`emit`/`close` and the shared state
//! they operate on.
//!
//! The client handle is `Rc`-shared between the caller and the background
//! receive-loop task spawned by `open`. That's safe because `tokio-uring`
//! tasks are local to the single OS thread `tokio_uring::start` drives,
//! unlike `tokio::spawn`, `tokio_uring::spawn` does not require `Send`.

use std::net::ToSocketAddrs;
use std::rc::Rc;

use tokio::sync::Mutex as AsyncMutex;
use tokio_uring::net::TcpStream;

use crate::error::WsError;
use crate::frame::{self, Frame, Opcode};
use crate::handshake;
use crate::receive_loop::{self, Callback, Event};

/// Configuration recognized by `open` (spec §3).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        ClientConfig {
            host: host.into(),
            port,
            path: path.into(),
        }
    }
}

/// The close outcome a client handle's result slot is fulfilled with
/// (spec §3 "Client handle").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseOutcome {
    pub status_code: Option<u16>,
    pub message: String,
}

/// Single-assignment cell: the first `set_once` wins, every later one is a
/// silent no-op (spec §9 "Result slot").
#[derive(Default)]
struct ResultSlot {
    inner: std::cell::RefCell<Option<CloseOutcome>>,
}

impl ResultSlot {
    fn set_once(&self, outcome: CloseOutcome) {
        let mut slot = self.inner.borrow_mut();
        if slot.is_none() {
            *slot = Some(outcome);
        }
    }

    fn is_set(&self) -> bool {
        self.inner.borrow().is_some()
    }

    fn get(&self) -> Option<CloseOutcome> {
        self.inner.borrow().clone()
    }
}

/// An open (or just-closed) WebSocket connection.
pub struct ClientHandle {
    pub(crate) stream: TcpStream,
    write_lock: AsyncMutex<()>,
    result: ResultSlot,
}

impl ClientHandle {
    /// All writes (user `emit`s, the loop's automatic pongs, and close
    /// frames from either side) go through this lock, serializing the
    /// output stream per spec §5.
    pub(crate) async fn write_frame(&self, frame: &Frame) -> Result<(), WsError> {
        let _guard = self.write_lock.lock().await;
        frame::encode(&self.stream, frame, true).await
    }

    pub(crate) fn fulfill_result(&self, outcome: CloseOutcome) {
        self.result.set_once(outcome);
    }

    pub(crate) async fn shutdown(&self) -> std::io::Result<()> {
        self.stream.shutdown(std::net::Shutdown::Both).await
    }

    /// The close outcome, once the connection has terminated. `None`
    /// while the connection is still open.
    pub fn result(&self) -> Option<CloseOutcome> {
        self.result.get()
    }

    /// Send an application frame. Fails immediately, without touching the
    /// socket, if the result slot has already been fulfilled (spec §7
    /// usage error).
    pub async fn emit(&self, frame: Frame) -> Result<(), WsError> {
        if self.result.is_set() {
            return Err(WsError::usage(
                "emit() called after the connection's result was already fulfilled",
            ));
        }
        self.write_frame(&frame).await
    }

    pub async fn send_text(&self, text: &str) -> Result<(), WsError> {
        self.emit(Frame::new(true, Opcode::Text, text.as_bytes().to_vec())).await
    }

    pub async fn send_binary(&self, data: Vec<u8>) -> Result<(), WsError> {
        self.emit(Frame::new(true, Opcode::Binary, data)).await
    }

    pub async fn send_ping(&self, data: Vec<u8>) -> Result<(), WsError> {
        self.emit(Frame::new(true, Opcode::Ping, data)).await
    }

    /// Locally initiate a close: send a close frame, close the socket, and
    /// fulfill the result slot. A second call is a no-op (spec §4.J).
    pub async fn close(&self, status_code: Option<u16>, message: &str) -> Result<(), WsError> {
        if self.result.is_set() {
            return Ok(());
        }
        let payload = frame::build_close_payload(status_code, message);
        let frame = Frame::new(true, Opcode::Close, payload);
        let write_result = self.write_frame(&frame).await;
        self.result.set_once(CloseOutcome {
            status_code,
            message: message.to_string(),
        });
        if let Err(e) = self.shutdown().await {
            log::warn!("error shutting down socket during close(): {e}");
        }
        write_result
    }
}

/// Open a TCP connection, run the opening handshake, and spawn the
/// background receive loop (spec §4.J `open`).
///
/// `cb` is invoked once per delivered message, in wire order, and exactly
/// once more at the end with `Event::Close`.
pub async fn open(
    config: ClientConfig,
    cb: impl Fn(Event, Rc<ClientHandle>) + 'static,
) -> Result<Rc<ClientHandle>, WsError> {
    let addr = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(WsError::from)?
        .next()
        .ok_or_else(|| WsError::handshake(format!("could not resolve {}:{}", config.host, config.port)))?;

    log::debug!("connecting to {addr}");
    let stream = TcpStream::connect(addr).await.map_err(WsError::from)?;

    handshake::perform(&stream, &config.host, config.port, &config.path).await?;

    let client = Rc::new(ClientHandle {
        stream,
        write_lock: AsyncMutex::new(()),
        result: ResultSlot::default(),
    });

    let loop_client = client.clone();
    let callback: Callback = Rc::new(cb);
    tokio_uring::spawn(receive_loop::run(loop_client, callback));

    Ok(client)
}
