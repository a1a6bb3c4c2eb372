//! # gangway
//!
//! **Gangway** normalizes server-side HTTP and socket interaction across
//! unrelated server runtimes into two uniform abstractions: a server-side
//! HTTP exchange and a server-side bidirectional socket.
//!
//! Higher-level real-time transport logic (long-polling, streaming,
//! fallback negotiation) is written once against these abstractions and
//! runs unmodified on any backend: one thin adapter per runtime translates
//! native request/response/socket callbacks into the narrow contracts this
//! crate defines, and the state machines here take care of the hard part —
//! header/body/response/close sequencing, exactly-once close under
//! local/remote races, and serializing writes for backends that tolerate
//! only one in-flight asynchronous write.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                        application code
//!        ▲ body/chunk/end     ▲ text/binary      ▲ close/error
//!        │ (Signal fires)     │ (Signal fires)   │ (Signal fires)
//! ┌──────┴─────────────┐   ┌──┴───────────────┐  │
//! │ ServerHttpExchange │   │ ServerWebSocket  │◄─┘
//! │ Idle → Reading →   │   │ Open → Closing → │
//! │   Ended → Closed   │   │        Closed    │
//! └──────┬──────▲──────┘   └──────┬──────▲────┘
//!        │      │ handle_chunk    │      │ handle_frame
//!        │      │ handle_end      │      │ handle_close
//!        │      │ handle_close    │      │ handle_error
//!        │      │ handle_error    │      │ handle_send_result
//! ┌──────▼──────┴──────┐   ┌──────▼──────┴────┐
//! │   HttpTransport    │   │ SocketTransport  │   one impl per backend
//! └──────┬─────────────┘   └──────┬───────────┘
//!        ▼                        ▼
//!   native response          native socket          (hyper, servlet
//!   + body read path         + frame callbacks       container, ...)
//! ```
//!
//! ### Lifecycle
//! ```text
//! HTTP exchange                        Socket
//!
//! backend accepts request             backend reports connected
//!   └► ServerHttpExchange::new          └► ServerWebSocket::new
//!        │                                   │
//!  read: body_action()/read()          send()/send_bytes()
//!        ├► transport.begin_read            ├► gate free: transport send
//!        ├► chunks fire, buffer             └► in flight: queue (FIFO),
//!        └► end: body fires once               released by
//!  write: set_status/set_header                handle_send_result
//!        ├► first write freezes head    close()/handle_close()
//!        └► end() is idempotent             ├► whichever path wins,
//!                                           │  close fires exactly once
//!  close: both directions settled           └► other signals disabled
//!        └► close fires exactly once           first; close is last
//! ```
//!
//! ## Features
//! | Area             | Description                                                        | Key types / traits                      |
//! |------------------|--------------------------------------------------------------------|-----------------------------------------|
//! | **Signals**      | Ordered multicast delivery with once/replay/disable semantics.     | [`Signal`], [`SignalOpts`]              |
//! | **HTTP**         | Portable exchange: request head, body modes, response sequencing.  | [`ServerHttpExchange`], [`RequestHead`] |
//! | **Sockets**      | Portable socket: frames, exactly-once close, single-flight gate.   | [`ServerWebSocket`], [`Frame`]          |
//! | **Adapter seam** | The per-backend contracts and their capability flags.              | [`HttpTransport`], [`SocketTransport`]  |
//! | **Errors**       | Caller misuse vs. backend failures, kept on separate paths.        | [`HttpError`], [`TransportError`]       |
//!
//! ## Optional features
//! - `mock`: exports the scripted in-memory backends
//!   ([`MockHttpTransport`], [`MockSocketTransport`]) used by the demos and
//!   handy for adapter development.
//!
//! ## Example
//! ```rust
//! use bytes::Bytes;
//! use gangway::{
//!     HttpTransport, ReadFeed, RequestHead, ServerHttpExchange, TransportError,
//! };
//! use http::{HeaderMap, Method, StatusCode};
//!
//! /// Stands in for one backend's native response object.
//! struct StdoutTransport;
//!
//! impl HttpTransport for StdoutTransport {
//!     fn set_status(&self, status: StatusCode) -> Result<(), TransportError> {
//!         println!("status: {status}");
//!         Ok(())
//!     }
//!     fn set_header(&self, name: &str, value: &str) -> Result<(), TransportError> {
//!         println!("header: {name}: {value}");
//!         Ok(())
//!     }
//!     fn write(&self, chunk: Bytes) -> Result<(), TransportError> {
//!         println!("write: {} bytes", chunk.len());
//!         Ok(())
//!     }
//!     fn end(&self) -> Result<(), TransportError> {
//!         println!("end");
//!         Ok(())
//!     }
//!     fn begin_read(&self, feed: ReadFeed) {
//!         // A real backend delivers the body from its own callbacks.
//!         feed.chunk(&b"hello"[..]);
//!         feed.end();
//!     }
//! }
//!
//! let head = RequestHead::new(Method::POST, "/echo", HeaderMap::new());
//! let exchange = ServerHttpExchange::new(head, Box::new(StdoutTransport));
//!
//! let responder = exchange.clone();
//! exchange.body_action(move |body| {
//!     responder.set_header("content-type", "text/plain").ok();
//!     responder.end_with(&format!("{} bytes received", body.len()));
//! });
//!
//! // Fires exactly once, after both directions have settled.
//! exchange.close_action(|| println!("exchange closed"));
//! ```
mod error;
mod http;
mod signal;
mod ws;

// ---- Public re-exports ----

pub use error::{HttpError, TransportError};
pub use http::{HttpTransport, Payload, ReadFeed, ReadMode, RequestHead, ServerHttpExchange};
pub use signal::{Signal, SignalOpts};
pub use ws::{Frame, ServerWebSocket, SocketTransport, WritePolicy};

// Optional: expose the scripted in-memory backends.
// Enable with: `--features mock`
#[cfg(any(test, feature = "mock"))]
mod mock;
#[cfg(feature = "mock")]
pub use mock::{HttpCall, MockHttpTransport, MockSocketTransport, NativeHandle, SocketCall};
