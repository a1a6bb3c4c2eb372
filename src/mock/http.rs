//! Scripted HTTP backend: records every primitive, injects the body.

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::StatusCode;

use crate::error::TransportError;
use crate::http::{HttpTransport, ReadFeed, ReadMode};
use crate::signal::lock_unpoisoned;

use super::native::NativeHandle;

/// One recorded write-side primitive call, in delegation order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HttpCall {
    /// `set_status(status)`.
    Status(StatusCode),
    /// `set_header(name, value)`.
    Header(String, String),
    /// `write(chunk)`, post-encoding.
    Write(Bytes),
    /// `end()`.
    End,
}

/// A scripted body step delivered when the read starts.
#[derive(Clone, Debug)]
enum Step {
    Chunk(Bytes),
    End,
}

struct Inner {
    read_mode: ReadMode,
    calls: Mutex<Vec<HttpCall>>,
    feed: Mutex<Option<ReadFeed>>,
    script: Mutex<Vec<Step>>,
    fail_write: AtomicBool,
    native: NativeHandle,
}

/// In-memory [`HttpTransport`] for tests, demos and adapter development.
///
/// Cheap to clone; clones share one recording. The usual pattern keeps one
/// handle for assertions and passes [`boxed`](Self::boxed) to the exchange:
///
/// ```text
/// let mock = MockHttpTransport::new();
/// let exchange = ServerHttpExchange::new(head, mock.boxed());
/// ...
/// assert_eq!(mock.calls(), vec![...]);
/// ```
///
/// Body delivery is driven from the test: once the exchange triggers the
/// read, [`feed`](Self::feed) returns the captured [`ReadFeed`] to push
/// chunks through. An [`eager`](Self::eager) mock instead replays a
/// pre-recorded script synchronously inside `begin_read`, the way a
/// blocking backend delivers a body before the application sees the
/// exchange.
#[derive(Clone)]
pub struct MockHttpTransport {
    inner: Arc<Inner>,
}

impl MockHttpTransport {
    /// Creates a lazy-read mock: the body is fed manually via
    /// [`feed`](Self::feed).
    pub fn new() -> Self {
        Self::with_mode(ReadMode::Lazy)
    }

    /// Creates an eager-read mock: `begin_read` replays the script
    /// (see [`script_chunk`](Self::script_chunk)) synchronously.
    pub fn eager() -> Self {
        Self::with_mode(ReadMode::Eager)
    }

    fn with_mode(read_mode: ReadMode) -> Self {
        Self {
            inner: Arc::new(Inner {
                read_mode,
                calls: Mutex::new(Vec::new()),
                feed: Mutex::new(None),
                script: Mutex::new(Vec::new()),
                fail_write: AtomicBool::new(false),
                native: NativeHandle::new(1),
            }),
        }
    }

    /// Appends a body chunk to the script replayed at `begin_read`.
    pub fn script_chunk(self, data: impl Into<Bytes>) -> Self {
        lock_unpoisoned(&self.inner.script).push(Step::Chunk(data.into()));
        self
    }

    /// Appends end-of-body to the script replayed at `begin_read`.
    pub fn script_end(self) -> Self {
        lock_unpoisoned(&self.inner.script).push(Step::End);
        self
    }

    /// Boxes a clone of this mock for [`ServerHttpExchange::new`].
    ///
    /// [`ServerHttpExchange::new`]: crate::ServerHttpExchange::new
    pub fn boxed(&self) -> Box<dyn HttpTransport> {
        Box::new(self.clone())
    }

    /// Snapshot of every recorded primitive call, in delegation order.
    pub fn calls(&self) -> Vec<HttpCall> {
        lock_unpoisoned(&self.inner.calls).clone()
    }

    /// The [`ReadFeed`] captured when the exchange started the read, or
    /// `None` while the read has not been triggered.
    pub fn feed(&self) -> Option<ReadFeed> {
        lock_unpoisoned(&self.inner.feed).clone()
    }

    /// Makes the next `write` fail with a scripted I/O error.
    pub fn fail_next_write(&self) {
        self.inner.fail_write.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: HttpCall) {
        lock_unpoisoned(&self.inner.calls).push(call);
    }
}

impl Default for MockHttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for MockHttpTransport {
    fn set_status(&self, status: StatusCode) -> Result<(), TransportError> {
        self.record(HttpCall::Status(status));
        Ok(())
    }

    fn set_header(&self, name: &str, value: &str) -> Result<(), TransportError> {
        self.record(HttpCall::Header(name.to_owned(), value.to_owned()));
        Ok(())
    }

    fn write(&self, chunk: Bytes) -> Result<(), TransportError> {
        if self.inner.fail_write.swap(false, Ordering::SeqCst) {
            return Err(TransportError::io("scripted write failure"));
        }
        self.record(HttpCall::Write(chunk));
        Ok(())
    }

    fn end(&self) -> Result<(), TransportError> {
        self.record(HttpCall::End);
        Ok(())
    }

    fn begin_read(&self, feed: ReadFeed) {
        *lock_unpoisoned(&self.inner.feed) = Some(feed.clone());
        let script: Vec<Step> = lock_unpoisoned(&self.inner.script).drain(..).collect();
        for step in script {
            match step {
                Step::Chunk(data) => feed.chunk(data),
                Step::End => feed.end(),
            }
        }
    }

    fn read_mode(&self) -> ReadMode {
        self.inner.read_mode
    }

    fn native(&self, ty: TypeId) -> Option<&dyn Any> {
        if ty == TypeId::of::<NativeHandle>() {
            Some(&self.inner.native)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for MockHttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHttpTransport")
            .field("read_mode", &self.inner.read_mode)
            .field("calls", &lock_unpoisoned(&self.inner.calls).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_primitives_in_order() {
        let mock = MockHttpTransport::new();
        mock.set_status(StatusCode::ACCEPTED).unwrap();
        mock.set_header("x-a", "1").unwrap();
        mock.write(Bytes::from_static(b"hi")).unwrap();
        mock.end().unwrap();

        assert_eq!(
            mock.calls(),
            vec![
                HttpCall::Status(StatusCode::ACCEPTED),
                HttpCall::Header("x-a".into(), "1".into()),
                HttpCall::Write(Bytes::from_static(b"hi")),
                HttpCall::End,
            ]
        );
    }

    #[test]
    fn test_fail_next_write_is_one_shot() {
        let mock = MockHttpTransport::new();
        mock.fail_next_write();
        assert!(mock.write(Bytes::from_static(b"a")).is_err());
        assert!(mock.write(Bytes::from_static(b"b")).is_ok());
        assert_eq!(mock.calls(), vec![HttpCall::Write(Bytes::from_static(b"b"))]);
    }

    #[test]
    fn test_clones_share_one_recording() {
        let mock = MockHttpTransport::new();
        let other = mock.clone();
        other.end().unwrap();
        assert_eq!(mock.calls(), vec![HttpCall::End]);
    }
}
