//! Fragmentation reassembly, callback dispatch, and the close protocol
//! (spec §4.I). This is the crate's core: the background task that owns
//! the input stream exclusively and runs until a transport failure,
//! protocol violation, or close frame terminates it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::client::{ClientHandle, CloseOutcome};
use crate::error::WsError;
use crate::frame::{self, Frame, Opcode};

/// A delivered message, passed to the user callback exactly as described
/// in spec §6's callback contract.
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close(CloseOutcome),
}

/// The user callback. It receives an owned `Rc<ClientHandle>` rather than
/// a borrow: per spec §9 ("callback re-entrancy") it must be legal for the
/// callback to call `emit` on the same client, and since every client
/// operation is itself async, the natural way for a plain (non-async)
/// callback to do that is to clone the handle and `tokio_uring::spawn` a
/// task that awaits it. The send lock is released before this is invoked,
/// so even a synchronous-looking re-entrant `emit` never deadlocks.
pub type Callback = Rc<dyn Fn(Event, Rc<ClientHandle>)>;

/// Non-final data frames accumulated while a fragmented message is in
/// progress (spec §3 "Reassembly buffer").
struct Reassembly {
    opcode: Opcode,
    chunks: Vec<Vec<u8>>,
}

/// What to do with one already-validated frame, given the current
/// reassembly state (spec §4.I). Pure and socket-free: [`run`] matches on
/// this to decide what (if anything) to write back, deliver, or finalize.
#[derive(Debug, PartialEq, Eq)]
enum Dispatch {
    /// The frame only updated `reassembly`; nothing to deliver yet.
    Pending,
    /// Deliver `Event` to the callback; the connection continues.
    Deliver(Event),
    /// A ping arrived: reply with a pong carrying the same payload, then
    /// deliver `Event::Ping` with it.
    Pong(Vec<u8>),
    /// The connection must terminate. `reply` is the close status to echo
    /// to the peer; `outcome` is what the result slot and the final
    /// `Event::Close` should carry.
    Terminate { reply: u16, outcome: CloseOutcome },
}

/// Handle one already-validated frame against `reassembly`, producing what
/// the loop should do next. This is the fragmentation state machine and
/// the close-payload handling from spec §4.I, factored out of [`run`] so it
/// can be exercised without a socket.
fn dispatch_frame(frame: Frame, reassembly: &mut Option<Reassembly>) -> Dispatch {
    match frame.opcode {
        Opcode::Text | Opcode::Binary if frame.fin && reassembly.is_none() => {
            match deliver_complete_message(frame.opcode, frame.payload) {
                Ok(event) => Dispatch::Deliver(event),
                Err(e) => terminate(e.status_code().unwrap_or(crate::error::STATUS_INVALID_PAYLOAD), String::new()),
            }
        }
        Opcode::Text | Opcode::Binary => {
            *reassembly = Some(Reassembly {
                opcode: frame.opcode,
                chunks: vec![frame.payload],
            });
            Dispatch::Pending
        }
        Opcode::Continuation if !frame.fin => match reassembly.as_mut() {
            Some(r) => {
                r.chunks.push(frame.payload);
                Dispatch::Pending
            }
            // Not explicitly enumerated in spec §4.H, but a stray
            // continuation frame with no message in progress violates the
            // invariant in §4.I that the buffer is empty iff a new
            // text/binary frame may legally start.
            None => terminate(crate::error::STATUS_PROTOCOL_ERROR, String::new()),
        },
        Opcode::Continuation => match reassembly.take() {
            Some(r) => {
                let mut combined = Vec::new();
                for chunk in r.chunks {
                    combined.extend_from_slice(&chunk);
                }
                combined.extend_from_slice(&frame.payload);
                match deliver_complete_message(r.opcode, combined) {
                    Ok(event) => Dispatch::Deliver(event),
                    Err(e) => terminate(e.status_code().unwrap_or(crate::error::STATUS_INVALID_PAYLOAD), String::new()),
                }
            }
            None => terminate(crate::error::STATUS_PROTOCOL_ERROR, String::new()),
        },
        Opcode::Close => match frame::parse_close_payload(&frame.payload) {
            Ok((status_code, message)) => Dispatch::Terminate {
                reply: status_code.unwrap_or(1000),
                outcome: CloseOutcome { status_code, message },
            },
            Err(e) => terminate(e.status_code().unwrap_or(crate::error::STATUS_PROTOCOL_ERROR), String::new()),
        },
        Opcode::Ping => Dispatch::Pong(frame.payload),
        Opcode::Pong => Dispatch::Deliver(Event::Pong(frame.payload)),
    }
}

/// Build a `Terminate` whose reply and committed outcome share the same
/// status code, the shape every protocol-violation path in [`dispatch_frame`]
/// needs.
fn terminate(status: u16, message: String) -> Dispatch {
    Dispatch::Terminate {
        reply: status,
        outcome: CloseOutcome {
            status_code: Some(status),
            message,
        },
    }
}

fn invoke_callback(cb: &Callback, event: Event, client: Rc<ClientHandle>) {
    // spec §6: "implementations should guarantee they do not leave the
    // socket half-closed" if the callback panics. We only need to stop a
    // panic from unwinding through the loop; the loop's own close path
    // already ran (or will run) independent of what the callback does.
    let result = catch_unwind(AssertUnwindSafe(|| cb(event, client)));
    if let Err(payload) = result {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "callback panicked".to_string());
        log::error!("WebSocket callback panicked: {msg}");
    }
}

/// Run the receive loop until the connection terminates. `client` is the
/// shared handle the loop reads frames from and (for pongs/closes) writes
/// frames back through; `cb` receives every delivered event.
pub async fn run(client: Rc<ClientHandle>, cb: Callback) {
    let mut reassembly: Option<Reassembly> = None;

    loop {
        let frame = match frame::decode(&client.stream).await {
            Ok(frame) => frame,
            Err(WsError::Transport(e)) => {
                log::warn!("WebSocket transport error, closing abnormally: {e}");
                finish(client.clone(), &cb, None, String::new()).await;
                return;
            }
            Err(e) => {
                let status = e.status_code().unwrap_or(crate::error::STATUS_PROTOCOL_ERROR);
                log::warn!("WebSocket protocol violation while decoding: {e}");
                send_close_reply(&client, status).await;
                finish(client.clone(), &cb, Some(status), String::new()).await;
                return;
            }
        };

        if let Err(e) = frame::validate(&frame, reassembly.is_some()) {
            let status = e.status_code().unwrap_or(crate::error::STATUS_PROTOCOL_ERROR);
            log::warn!("WebSocket frame failed validation: {e}");
            send_close_reply(&client, status).await;
            finish(client.clone(), &cb, Some(status), String::new()).await;
            return;
        }

        match dispatch_frame(frame, &mut reassembly) {
            Dispatch::Pending => {}
            Dispatch::Deliver(event) => invoke_callback(&cb, event, client.clone()),
            Dispatch::Pong(payload) => {
                let pong = Frame::new(true, Opcode::Pong, payload.clone());
                if let Err(e) = client.write_frame(&pong).await {
                    log::warn!("failed to send automatic pong: {e}");
                }
                invoke_callback(&cb, Event::Ping(payload), client.clone());
            }
            Dispatch::Terminate { reply, outcome } => {
                log::warn!("WebSocket connection terminating: {outcome:?}");
                send_close_reply(&client, reply).await;
                finish(client.clone(), &cb, outcome.status_code, outcome.message).await;
                return;
            }
        }
    }
}

fn deliver_complete_message(opcode: Opcode, payload: Vec<u8>) -> Result<Event, WsError> {
    match opcode {
        Opcode::Text => Ok(Event::Text(crate::utf8::validate_owned(payload)?)),
        Opcode::Binary => Ok(Event::Binary(payload)),
        _ => unreachable!("deliver_complete_message only called for Text/Binary"),
    }
}

async fn send_close_reply(client: &ClientHandle, status_code: u16) {
    let payload = frame::build_close_payload(Some(status_code), "");
    let frame = Frame::new(true, Opcode::Close, payload);
    if let Err(e) = client.write_frame(&frame).await {
        log::warn!("failed to send close reply: {e}");
    }
}

async fn finish(client: Rc<ClientHandle>, cb: &Callback, status_code: Option<u16>, message: String) {
    // `fulfill_result` is a no-op if a local `close()` already won the race
    // (e.g. it shut down the socket itself, and this call is only running
    // because that shutdown unblocked our read with an EOF/transport error).
    // Read back whatever actually got committed so the callback reports the
    // real close reason instead of the empty one this call site guessed.
    client.fulfill_result(CloseOutcome { status_code, message });
    let committed = client.result().expect("result slot set by fulfill_result above");
    let _ = client.shutdown().await;
    invoke_callback(cb, Event::Close(committed), client);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_frame(fin: bool, opcode: Opcode, payload: &[u8]) -> Frame {
        Frame::new(fin, opcode, payload.to_vec())
    }

    #[test]
    fn single_frame_text_delivers_immediately() {
        let mut reassembly = None;
        let dispatch = dispatch_frame(data_frame(true, Opcode::Text, b"Hello"), &mut reassembly);
        assert_eq!(dispatch, Dispatch::Deliver(Event::Text("Hello".to_string())));
        assert!(reassembly.is_none());
    }

    #[test]
    fn single_frame_binary_delivers_immediately() {
        let mut reassembly = None;
        let dispatch = dispatch_frame(data_frame(true, Opcode::Binary, &[1, 2, 3]), &mut reassembly);
        assert_eq!(dispatch, Dispatch::Deliver(Event::Binary(vec![1, 2, 3])));
    }

    #[test]
    fn fragmented_text_reassembles_across_continuations() {
        let mut reassembly = None;
        assert_eq!(
            dispatch_frame(data_frame(false, Opcode::Text, b"He"), &mut reassembly),
            Dispatch::Pending
        );
        assert_eq!(
            dispatch_frame(data_frame(false, Opcode::Continuation, b"ll"), &mut reassembly),
            Dispatch::Pending
        );
        let dispatch = dispatch_frame(data_frame(true, Opcode::Continuation, b"o"), &mut reassembly);
        assert_eq!(dispatch, Dispatch::Deliver(Event::Text("Hello".to_string())));
        assert!(reassembly.is_none());
    }

    /// Spec §8 scenario 5: three frames `{fin=0,opcode=1,[1,2]}`,
    /// `{fin=0,opcode=0,[3,4]}`, `{fin=1,opcode=0,[5,6]}` reassemble into
    /// `[1,2,3,4,5,6]`, which is not valid UTF-8, so the message must be
    /// rejected with a 1007 close rather than delivered.
    #[test]
    fn scenario_5_fragmented_text_with_invalid_utf8_closes_with_1007() {
        let mut reassembly = None;
        assert_eq!(
            dispatch_frame(data_frame(false, Opcode::Text, &[1, 2]), &mut reassembly),
            Dispatch::Pending
        );
        assert_eq!(
            dispatch_frame(data_frame(false, Opcode::Continuation, &[3, 4]), &mut reassembly),
            Dispatch::Pending
        );
        let dispatch = dispatch_frame(data_frame(true, Opcode::Continuation, &[5, 6]), &mut reassembly);
        match dispatch {
            Dispatch::Terminate { reply, outcome } => {
                assert_eq!(reply, 1007);
                assert_eq!(outcome.status_code, Some(1007));
                assert_eq!(outcome.message, "");
            }
            other => panic!("expected Terminate, got {other:?}"),
        }
        assert!(reassembly.is_none());
    }

    #[test]
    fn stray_continuation_without_a_message_in_progress_is_a_protocol_error() {
        let mut reassembly = None;
        let dispatch = dispatch_frame(data_frame(true, Opcode::Continuation, b"x"), &mut reassembly);
        match dispatch {
            Dispatch::Terminate { reply, outcome } => {
                assert_eq!(reply, 1002);
                assert_eq!(outcome.status_code, Some(1002));
            }
            other => panic!("expected Terminate, got {other:?}"),
        }

        let mut reassembly = None;
        let dispatch = dispatch_frame(data_frame(false, Opcode::Continuation, b"x"), &mut reassembly);
        match dispatch {
            Dispatch::Terminate { reply, .. } => assert_eq!(reply, 1002),
            other => panic!("expected Terminate, got {other:?}"),
        }
    }

    #[test]
    fn close_frame_with_code_and_reason_echoes_the_code_and_delivers_both() {
        let mut reassembly = None;
        let payload = frame::build_close_payload(Some(1000), "bye");
        let dispatch = dispatch_frame(data_frame(true, Opcode::Close, &payload), &mut reassembly);
        match dispatch {
            Dispatch::Terminate { reply, outcome } => {
                assert_eq!(reply, 1000);
                assert_eq!(outcome.status_code, Some(1000));
                assert_eq!(outcome.message, "bye");
            }
            other => panic!("expected Terminate, got {other:?}"),
        }
    }

    #[test]
    fn close_frame_with_empty_payload_echoes_1000_with_no_code_in_the_outcome() {
        let mut reassembly = None;
        let dispatch = dispatch_frame(data_frame(true, Opcode::Close, &[]), &mut reassembly);
        match dispatch {
            Dispatch::Terminate { reply, outcome } => {
                assert_eq!(reply, 1000);
                assert_eq!(outcome.status_code, None);
                assert_eq!(outcome.message, "");
            }
            other => panic!("expected Terminate, got {other:?}"),
        }
    }

    #[test]
    fn close_frame_with_invalid_code_closes_with_1002() {
        let mut reassembly = None;
        let dispatch = dispatch_frame(data_frame(true, Opcode::Close, &[0x04, 0x57]), &mut reassembly);
        match dispatch {
            Dispatch::Terminate { reply, .. } => assert_eq!(reply, 1002),
            other => panic!("expected Terminate, got {other:?}"),
        }
    }

    #[test]
    fn ping_produces_a_pong_dispatch_carrying_the_same_payload() {
        let mut reassembly = None;
        let dispatch = dispatch_frame(data_frame(true, Opcode::Ping, b"abc"), &mut reassembly);
        assert_eq!(dispatch, Dispatch::Pong(b"abc".to_vec()));
    }

    #[test]
    fn pong_delivers_directly() {
        let mut reassembly = None;
        let dispatch = dispatch_frame(data_frame(true, Opcode::Pong, b"abc"), &mut reassembly);
        assert_eq!(dispatch, Dispatch::Deliver(Event::Pong(b"abc".to_vec())));
    }
}
