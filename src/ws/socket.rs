//! # Server-side socket: one persistent bidirectional connection.
//!
//! [`ServerWebSocket`] is the portable face of a connected socket,
//! independent of which backend runtime owns the wire. The backend pushes
//! inbound traffic through `handle_*` entry points; applications subscribe
//! to its signals and send frames.
//!
//! ## Architecture
//! ```text
//!                application callbacks
//!        ▲ text   ▲ binary   ▲ close   ▲ error
//!        │        │          │         │              (Signal fires)
//!   ┌────┴────────┴──────────┴─────────┴────┐
//!   │            ServerWebSocket            │
//!   │     phase: Open → Closing → Closed    │
//!   │   send gate: in-flight + FIFO queue   │
//!   └────┬───────────────────────────▲──────┘
//!        │ send send_bytes close     │ handle_frame handle_close
//!        │                           │ handle_error handle_send_result
//!   ┌────▼───────────────────────────┴──────┐
//!   │             SocketTransport           │ one impl per backend
//!   └───────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - **`close()` is idempotent** and only requests the handshake; the
//!   close signal fires when the backend confirms via `handle_close`.
//! - **Close fires exactly once**, whether the peer closed, the
//!   application closed, or both raced. Text, binary and error signals are
//!   disabled first, so close is the last delivery.
//! - **Single-flight backends get serialized sends**: with
//!   [`WritePolicy::SingleFlight`] a second `send` queues until the
//!   adapter reports the previous completion. A failed write fails fast:
//!   the error signal carries the failure, then one
//!   [`TransportError::Dropped`] per queued frame that will never be sent.
//! - **Closed means inert**: sends and inbound events on a closed socket
//!   are silent no-ops.

use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tracing::{trace, warn};

use crate::error::TransportError;
use crate::signal::{lock_unpoisoned, Signal};

use super::transport::{Frame, SocketTransport, WritePolicy};

/// Connection lifecycle of a socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Connected; everything flows.
    Open,
    /// A local close was requested; awaiting backend confirmation.
    Closing,
    /// Terminal: close fired, everything else is inert.
    Closed,
}

struct SocketState {
    phase: Phase,
    in_flight: bool,
    queue: VecDeque<Frame>,
}

struct SocketShared {
    uri: String,
    transport: Box<dyn SocketTransport>,
    gated: bool,
    state: Mutex<SocketState>,
    text: Signal<String>,
    binary: Signal<Bytes>,
    close: Signal<()>,
    error: Signal<TransportError>,
}

impl SocketShared {
    fn report_error(&self, err: TransportError) {
        warn!(uri = %self.uri, error = %err, label = err.as_label(), "transport failure");
        self.error.emit(err);
    }
}

/// Portable server-side socket.
///
/// Cheap to clone: clones share one underlying socket, which is how bridge
/// glue hands the same instance to native callbacks and to the
/// application. All methods take `&self`.
///
/// Constructed by backend glue via [`ServerWebSocket::new`] with the
/// connection URI and that backend's
/// [`SocketTransport`](super::transport::SocketTransport). See the
/// [module docs](self) for lifecycle rules.
#[derive(Clone)]
pub struct ServerWebSocket {
    shared: Arc<SocketShared>,
}

impl ServerWebSocket {
    /// Creates a socket over a backend transport.
    pub fn new(uri: impl Into<String>, transport: Box<dyn SocketTransport>) -> Self {
        let gated = transport.write_policy() == WritePolicy::SingleFlight;
        let shared = Arc::new(SocketShared {
            uri: uri.into(),
            transport,
            gated,
            state: Mutex::new(SocketState {
                phase: Phase::Open,
                in_flight: false,
                queue: VecDeque::new(),
            }),
            text: Signal::plain(),
            binary: Signal::plain(),
            close: Signal::latched(),
            error: Signal::plain(),
        });
        trace!(uri = %shared.uri, gated, "socket opened");
        Self { shared }
    }

    /// Connection URI, captured at construction.
    pub fn uri(&self) -> &str {
        &self.shared.uri
    }

    /// Sends a text frame.
    pub fn send(&self, text: impl Into<String>) {
        self.dispatch(Frame::Text(text.into()));
    }

    /// Sends a binary frame.
    pub fn send_bytes(&self, data: impl Into<Bytes>) {
        self.dispatch(Frame::Binary(data.into()));
    }

    fn dispatch(&self, frame: Frame) {
        {
            let mut state = lock_unpoisoned(&self.shared.state);
            if state.phase == Phase::Closed {
                warn!(uri = %self.shared.uri, "send on a closed socket; dropping");
                return;
            }
            if self.shared.gated {
                if state.in_flight {
                    trace!(
                        kind = frame.kind(),
                        queued = state.queue.len() + 1,
                        "write in flight; queueing frame"
                    );
                    state.queue.push_back(frame);
                    return;
                }
                state.in_flight = true;
            }
        }
        self.send_now(frame);
    }

    fn send_now(&self, frame: Frame) {
        trace!(kind = frame.kind(), len = frame.len(), "send frame");
        let result = match frame {
            Frame::Text(text) => self.shared.transport.send_text(&text),
            Frame::Binary(data) => self.shared.transport.send_binary(data),
        };
        if let Err(err) = result {
            self.write_failed(err);
        }
    }

    /// Releases the gate after a failure and fails fast on everything the
    /// failed write was blocking.
    fn write_failed(&self, err: TransportError) {
        let dropped: Vec<Frame> = {
            let mut state = lock_unpoisoned(&self.shared.state);
            state.in_flight = false;
            state.queue.drain(..).collect()
        };
        self.shared.report_error(err);
        for frame in dropped {
            self.shared.report_error(TransportError::dropped(format!(
                "{} frame of {} bytes was queued behind a failed write",
                frame.kind(),
                frame.len()
            )));
        }
    }

    /// Requests the close handshake. Idempotent; the close signal fires
    /// when the backend confirms via [`handle_close`](Self::handle_close).
    pub fn close(&self) {
        {
            let mut state = lock_unpoisoned(&self.shared.state);
            if state.phase != Phase::Open {
                return;
            }
            state.phase = Phase::Closing;
        }
        trace!(uri = %self.shared.uri, "close requested");
        if let Err(err) = self.shared.transport.close() {
            self.shared.report_error(err);
        }
    }

    /// Subscribes to inbound text frames.
    pub fn text_action<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.shared.text.subscribe(move |s: &String| f(s));
    }

    /// Subscribes to inbound binary frames.
    pub fn binary_action<F>(&self, f: F)
    where
        F: Fn(&Bytes) + Send + Sync + 'static,
    {
        self.shared.binary.subscribe(f);
    }

    /// Subscribes to the terminal close notification. Replays if the
    /// socket already closed.
    pub fn close_action<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.close.subscribe(move |_| f());
    }

    /// Subscribes to transport failures and dropped-frame reports.
    pub fn error_action<F>(&self, f: F)
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        self.shared.error.subscribe(f);
    }

    /// Entry point for backend glue: one inbound frame.
    pub fn handle_frame(&self, frame: Frame) {
        if lock_unpoisoned(&self.shared.state).phase == Phase::Closed {
            return;
        }
        trace!(kind = frame.kind(), len = frame.len(), "inbound frame");
        match frame {
            Frame::Text(text) => self.shared.text.emit(text),
            Frame::Binary(data) => self.shared.binary.emit(data),
        }
    }

    /// Entry point for backend glue: the connection is gone.
    ///
    /// Safe to call from both the remote-close and local-close paths;
    /// whichever arrives first wins and the other collapses into a no-op,
    /// so subscribers see exactly one close.
    pub fn handle_close(&self) {
        let (origin, dropped) = {
            let mut state = lock_unpoisoned(&self.shared.state);
            if state.phase == Phase::Closed {
                return;
            }
            let origin = if state.phase == Phase::Closing {
                "local"
            } else {
                "remote"
            };
            state.phase = Phase::Closed;
            state.in_flight = false;
            (origin, state.queue.drain(..).collect::<Vec<_>>())
        };
        trace!(uri = %self.shared.uri, origin, "socket closed");
        for frame in dropped {
            self.shared.report_error(TransportError::dropped(format!(
                "{} frame of {} bytes was still queued when the connection closed",
                frame.kind(),
                frame.len()
            )));
        }
        self.shared.text.disable();
        self.shared.binary.disable();
        self.shared.error.disable();
        self.shared.close.emit(());
    }

    /// Entry point for backend glue: a native failure tied to this socket.
    /// Forwarded to the error signal; silent once closed.
    pub fn handle_error(&self, err: TransportError) {
        self.shared.report_error(err);
    }

    /// Entry point for backend glue: outcome of the last delegated send.
    ///
    /// On a [`WritePolicy::SingleFlight`] backend this releases the gate:
    /// `Ok` issues the next queued frame, `Err` fails fast (the error
    /// signal carries the failure, then one [`TransportError::Dropped`]
    /// per queued frame). On a [`WritePolicy::Direct`] backend it reduces
    /// to error forwarding.
    pub fn handle_send_result(&self, result: Result<(), TransportError>) {
        match result {
            Ok(()) => {
                let next = {
                    let mut state = lock_unpoisoned(&self.shared.state);
                    state.in_flight = false;
                    if state.phase == Phase::Closed {
                        state.queue.clear();
                        None
                    } else {
                        let next = state.queue.pop_front();
                        if next.is_some() {
                            state.in_flight = true;
                        }
                        next
                    }
                };
                if let Some(frame) = next {
                    self.send_now(frame);
                }
            }
            Err(err) => self.write_failed(err),
        }
    }

    /// Escape hatch to the backend's native object, or `None` when this
    /// backend cannot expose a `T`.
    pub fn native<T: Any>(&self) -> Option<&T> {
        self.shared.transport.native(TypeId::of::<T>())?.downcast_ref()
    }
}

impl std::fmt::Debug for ServerWebSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock_unpoisoned(&self.shared.state);
        f.debug_struct("ServerWebSocket")
            .field("uri", &self.shared.uri)
            .field("phase", &state.phase)
            .field("gated", &self.shared.gated)
            .field("queued", &state.queue.len())
            .finish()
    }
}
