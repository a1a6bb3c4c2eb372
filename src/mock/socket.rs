//! Scripted socket backend: records frames, lets tests drive the gate.

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::error::TransportError;
use crate::signal::lock_unpoisoned;
use crate::ws::{SocketTransport, WritePolicy};

use super::native::NativeHandle;

/// One recorded outbound primitive call, in delegation order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketCall {
    /// `send_text(data)`.
    SendText(String),
    /// `send_binary(data)`.
    SendBinary(Bytes),
    /// `close()`.
    Close,
}

struct Inner {
    write_policy: WritePolicy,
    calls: Mutex<Vec<SocketCall>>,
    fail_send: AtomicBool,
    native: NativeHandle,
}

/// In-memory [`SocketTransport`] for tests, demos and adapter development.
///
/// Cheap to clone; clones share one recording. In
/// [`single_flight`](Self::single_flight) mode the mock never completes a
/// write on its own: the test reports completions through the socket's
/// `handle_send_result`, which is exactly how an adapter for a
/// one-write-in-flight backend drives the gate.
#[derive(Clone)]
pub struct MockSocketTransport {
    inner: Arc<Inner>,
}

impl MockSocketTransport {
    /// Creates a direct-write mock (no gate).
    pub fn new() -> Self {
        Self::with_policy(WritePolicy::Direct)
    }

    /// Creates a mock that declares [`WritePolicy::SingleFlight`].
    pub fn single_flight() -> Self {
        Self::with_policy(WritePolicy::SingleFlight)
    }

    fn with_policy(write_policy: WritePolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                write_policy,
                calls: Mutex::new(Vec::new()),
                fail_send: AtomicBool::new(false),
                native: NativeHandle::new(2),
            }),
        }
    }

    /// Boxes a clone of this mock for [`ServerWebSocket::new`].
    ///
    /// [`ServerWebSocket::new`]: crate::ServerWebSocket::new
    pub fn boxed(&self) -> Box<dyn SocketTransport> {
        Box::new(self.clone())
    }

    /// Snapshot of every recorded primitive call, in delegation order.
    pub fn calls(&self) -> Vec<SocketCall> {
        lock_unpoisoned(&self.inner.calls).clone()
    }

    /// Makes the next send (text or binary) fail with a scripted I/O error.
    pub fn fail_next_send(&self) {
        self.inner.fail_send.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: SocketCall) {
        lock_unpoisoned(&self.inner.calls).push(call);
    }

    fn check_fail(&self) -> Result<(), TransportError> {
        if self.inner.fail_send.swap(false, Ordering::SeqCst) {
            Err(TransportError::io("scripted send failure"))
        } else {
            Ok(())
        }
    }
}

impl Default for MockSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketTransport for MockSocketTransport {
    fn send_text(&self, data: &str) -> Result<(), TransportError> {
        self.check_fail()?;
        self.record(SocketCall::SendText(data.to_owned()));
        Ok(())
    }

    fn send_binary(&self, data: Bytes) -> Result<(), TransportError> {
        self.check_fail()?;
        self.record(SocketCall::SendBinary(data));
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        self.record(SocketCall::Close);
        Ok(())
    }

    fn write_policy(&self) -> WritePolicy {
        self.inner.write_policy
    }

    fn native(&self, ty: TypeId) -> Option<&dyn Any> {
        if ty == TypeId::of::<NativeHandle>() {
            Some(&self.inner.native)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for MockSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSocketTransport")
            .field("write_policy", &self.inner.write_policy)
            .field("calls", &lock_unpoisoned(&self.inner.calls).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_sends_and_close_in_order() {
        let mock = MockSocketTransport::new();
        mock.send_text("a").unwrap();
        mock.send_binary(Bytes::from_static(&[1])).unwrap();
        mock.close().unwrap();

        assert_eq!(
            mock.calls(),
            vec![
                SocketCall::SendText("a".into()),
                SocketCall::SendBinary(Bytes::from_static(&[1])),
                SocketCall::Close,
            ]
        );
    }

    #[test]
    fn test_fail_next_send_is_one_shot_and_records_nothing() {
        let mock = MockSocketTransport::new();
        mock.fail_next_send();
        assert!(mock.send_text("lost").is_err());
        assert!(mock.send_text("kept").is_ok());
        assert_eq!(mock.calls(), vec![SocketCall::SendText("kept".into())]);
    }
}
