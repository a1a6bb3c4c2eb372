//! # Backend contract for server sockets.
//!
//! One [`SocketTransport`] implementation exists per backend runtime. It
//! covers the outbound half of a socket (send a frame, close the
//! connection); inbound traffic enters through the socket handle's
//! `handle_frame`/`handle_close`/`handle_error` entry points, driven by the
//! glue that owns the native connection callbacks.

use std::any::{Any, TypeId};

use bytes::Bytes;

use crate::error::TransportError;

/// How a backend accepts outbound frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WritePolicy {
    /// Writes are independent; the backend orders frames itself.
    #[default]
    Direct,
    /// The native API tolerates exactly one in-flight asynchronous write.
    /// The socket serializes sends: a frame sent while another is in
    /// flight is queued and issued only after the adapter reports the
    /// previous completion via `handle_send_result`. Two overlapping
    /// writes on such a backend corrupt frame ordering, so this is a
    /// correctness flag, not a tuning knob.
    SingleFlight,
}

/// One socket frame, inbound or outbound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A text frame (always UTF-8 on the wire).
    Text(String),
    /// A binary frame.
    Binary(Bytes),
}

impl Frame {
    /// Short kind tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Text(_) => "text",
            Frame::Binary(_) => "binary",
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(s) => s.len(),
            Frame::Binary(b) => b.len(),
        }
    }

    /// Returns `true` for an empty payload.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outbound primitives a backend must provide for one socket.
///
/// The socket validates lifecycle (no sends after close, single-flight
/// serialization) before delegating, so implementations translate calls
/// mechanically to the native socket object. Failures are returned as
/// [`TransportError`]; the socket forwards them to its error signal.
///
/// Implementations must not retain a strong handle to their own socket;
/// native callback wiring belongs in the bridge glue that constructed it.
///
/// # Example
/// ```
/// use bytes::Bytes;
/// use gangway::{SocketTransport, TransportError, WritePolicy};
///
/// /// Discards everything; stands in for a native socket object.
/// struct NullSocket;
///
/// impl SocketTransport for NullSocket {
///     fn send_text(&self, _data: &str) -> Result<(), TransportError> {
///         Ok(())
///     }
///     fn send_binary(&self, _data: Bytes) -> Result<(), TransportError> {
///         Ok(())
///     }
///     fn close(&self) -> Result<(), TransportError> {
///         Ok(())
///     }
///     fn write_policy(&self) -> WritePolicy {
///         WritePolicy::Direct
///     }
/// }
/// ```
pub trait SocketTransport: Send + Sync + 'static {
    /// Sends a text frame.
    fn send_text(&self, data: &str) -> Result<(), TransportError>;

    /// Sends a binary frame.
    fn send_binary(&self, data: Bytes) -> Result<(), TransportError>;

    /// Starts the native close handshake. The socket fires its close
    /// signal only when the backend confirms through `handle_close`.
    fn close(&self) -> Result<(), TransportError>;

    /// Declares how this backend accepts outbound frames.
    fn write_policy(&self) -> WritePolicy {
        WritePolicy::Direct
    }

    /// Escape hatch: returns the native object for `ty`, or `None` when
    /// the type is not one this transport can expose.
    fn native(&self, ty: TypeId) -> Option<&dyn Any> {
        let _ = ty;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_accessors() {
        let text = Frame::Text("hi".into());
        assert_eq!(text.kind(), "text");
        assert_eq!(text.len(), 2);

        let binary = Frame::Binary(Bytes::from_static(&[1, 2, 3]));
        assert_eq!(binary.kind(), "binary");
        assert_eq!(binary.len(), 3);
        assert!(!binary.is_empty());
        assert!(Frame::Text(String::new()).is_empty());
    }
}
