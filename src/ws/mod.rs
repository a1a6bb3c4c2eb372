//! Server-side sockets: one persistent bidirectional connection each.
//!
//! This module groups the socket half of the crate: the portable socket
//! state machine and the backend contract it delegates to.
//!
//! ## Contents
//! - [`ServerWebSocket`] the socket state machine
//! - [`SocketTransport`], [`WritePolicy`] the per-backend contract
//! - [`Frame`] one text or binary frame, inbound or outbound
//!
//! ## Quick wiring
//! ```text
//! backend glue ─► ServerWebSocket::new(uri, Box<dyn SocketTransport>)
//!                   │ outbound: send/send_bytes/close ─► transport
//!                   └ inbound:  handle_frame/handle_close/handle_error
//!                               handle_send_result (single-flight gate)
//! ```

mod socket;
mod transport;

pub use socket::ServerWebSocket;
pub use transport::{Frame, SocketTransport, WritePolicy};
