//! # Backend contract for HTTP exchanges.
//!
//! One [`HttpTransport`] implementation exists per backend runtime (a hyper
//! service, a servlet-style container, an embedded test double). It is the
//! narrow write-side seam between the portable state machine and the native
//! response object, plus the hook through which the native body read is
//! started.
//!
//! ```text
//!   ServerHttpExchange ── set_status/set_header/write/end ──► HttpTransport ──► native response
//!                      ── begin_read(ReadFeed) ─────────────►     │
//!                                                                 │ native body callbacks
//!   handle_chunk/handle_end ◄── ReadFeed::chunk/end ──────────────┘
//! ```
//!
//! Inbound lifecycle events that are not body data (connection aborted,
//! native error) are delivered through the exchange handle itself
//! (`handle_close`, `handle_error`) by whatever glue owns the native
//! connection callbacks.

use std::any::{Any, TypeId};
use std::sync::Weak;

use bytes::Bytes;
use http::StatusCode;

use crate::error::TransportError;

use super::exchange::HttpShared;

/// How a backend makes the request body available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// The backend can start reading on demand; the exchange defers
    /// [`begin_read`](HttpTransport::begin_read) until the application asks
    /// for the body.
    #[default]
    Lazy,
    /// The backend delivers the body on its own schedule (typically a
    /// synchronous read); the exchange triggers the read path and wires
    /// body assembly at construction so no chunk is lost before the
    /// application subscribes.
    Eager,
}

/// Write-side primitives a backend must provide for one HTTP exchange.
///
/// The exchange validates ordering (headers before first write, single
/// terminal end) before delegating, so implementations translate calls
/// mechanically to the native response object. Failures are returned as
/// [`TransportError`]; the exchange forwards them to its error signal
/// rather than surfacing them to the caller.
///
/// Implementations must not retain a strong reference to their own
/// exchange: the [`ReadFeed`] handed to [`begin_read`](Self::begin_read)
/// is weak precisely so the transport can hold it without leaking the
/// exchange. Native callback wiring that needs the full handle belongs in
/// the bridge glue that constructed the exchange.
///
/// # Example
/// ```
/// use bytes::Bytes;
/// use gangway::{HttpTransport, ReadFeed, TransportError};
/// use http::StatusCode;
///
/// /// Discards everything; stands in for a native response object.
/// struct NullTransport;
///
/// impl HttpTransport for NullTransport {
///     fn set_status(&self, _status: StatusCode) -> Result<(), TransportError> {
///         Ok(())
///     }
///     fn set_header(&self, _name: &str, _value: &str) -> Result<(), TransportError> {
///         Ok(())
///     }
///     fn write(&self, _chunk: Bytes) -> Result<(), TransportError> {
///         Ok(())
///     }
///     fn end(&self) -> Result<(), TransportError> {
///         Ok(())
///     }
///     fn begin_read(&self, _feed: ReadFeed) {}
/// }
/// ```
pub trait HttpTransport: Send + Sync + 'static {
    /// Applies the response status to the native response.
    fn set_status(&self, status: StatusCode) -> Result<(), TransportError>;

    /// Applies one response header. Multi-value headers arrive pre-joined
    /// with `", "`.
    fn set_header(&self, name: &str, value: &str) -> Result<(), TransportError>;

    /// Writes one response body chunk. Text has already been encoded with
    /// the response charset.
    fn write(&self, chunk: Bytes) -> Result<(), TransportError>;

    /// Completes the response. Called at most once.
    fn end(&self) -> Result<(), TransportError>;

    /// Starts the native body read. Called at most once per exchange; the
    /// implementation delivers body bytes through `feed`, synchronously or
    /// from native callbacks, finishing with [`ReadFeed::end`].
    fn begin_read(&self, feed: ReadFeed);

    /// Declares how this backend delivers the request body.
    fn read_mode(&self) -> ReadMode {
        ReadMode::Lazy
    }

    /// Escape hatch: returns the native object for `ty`, or `None` when the
    /// type is not one this transport can expose.
    fn native(&self, ty: TypeId) -> Option<&dyn Any> {
        let _ = ty;
        None
    }
}

/// Delivery handle for the request body, passed to
/// [`HttpTransport::begin_read`].
///
/// Holds only a weak reference: once the exchange is dropped the feed goes
/// dead and deliveries become no-ops, so a transport can stash it in native
/// callbacks without keeping the exchange alive.
#[derive(Clone)]
pub struct ReadFeed {
    pub(crate) shared: Weak<HttpShared>,
}

impl ReadFeed {
    /// Delivers the next slice of raw body bytes.
    pub fn chunk(&self, data: impl Into<Bytes>) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_chunk(data.into());
        }
    }

    /// Signals that the body is fully delivered.
    pub fn end(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_end();
        }
    }

    /// Returns `true` while the owning exchange is still alive.
    pub fn is_live(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

impl std::fmt::Debug for ReadFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadFeed")
            .field("live", &self.is_live())
            .finish()
    }
}
