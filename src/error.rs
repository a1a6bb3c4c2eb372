//! Error types used by the exchange and socket state machines.
//!
//! This module defines two main error enums:
//!
//! - [`HttpError`] — caller-side misuse of the HTTP exchange, returned as `Err`.
//! - [`TransportError`] — backend-side failures, delivered through error signals.
//!
//! The split mirrors how failures travel: a caller bug (mutating headers after
//! the response started) must fail fast at the call site, while an I/O failure
//! reported by the backend arrives asynchronously and is forwarded as data to
//! whoever subscribed to the error signal. Both types provide helper methods
//! (`as_label`, `as_message`) for logging/metrics.

use thiserror::Error;

/// # Caller-side misuse of an HTTP exchange.
///
/// These indicate a bug in the calling code, not a runtime condition, and are
/// returned directly from the offending call. The exchange itself stays valid.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// The response head was already flushed by the first body write.
    #[error("response already started: {operation} must precede the first write")]
    ResponseStarted {
        /// Name of the rejected operation (`set_status`, `set_header`, ...).
        operation: &'static str,
    },

    /// A `content-type` response header carried a `charset=` this crate
    /// cannot encode with.
    #[error("unsupported response charset: {name}")]
    UnsupportedCharset {
        /// The charset name as it appeared in the header value.
        name: String,
    },
}

impl HttpError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use gangway::HttpError;
    ///
    /// let err = HttpError::ResponseStarted { operation: "set_header" };
    /// assert_eq!(err.as_label(), "http_response_started");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HttpError::ResponseStarted { .. } => "http_response_started",
            HttpError::UnsupportedCharset { .. } => "http_unsupported_charset",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HttpError::ResponseStarted { operation } => {
                format!("{operation} rejected: response already started")
            }
            HttpError::UnsupportedCharset { name } => {
                format!("unsupported charset: {name}")
            }
        }
    }
}

/// # Backend-side failures forwarded through error signals.
///
/// These never surface as `Err` from exchange/socket operations; they are
/// emitted on the owning instance's error signal so the application decides
/// severity. The instance remains usable for close bookkeeping afterwards.
///
/// The type is `Clone` (variants carry rendered messages, not live sources)
/// so a single failure can fan out to every subscriber.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The backend reported an I/O failure (reset connection, failed write).
    #[error("i/o failure: {message}")]
    Io {
        /// The underlying error message.
        message: String,
    },

    /// A backend-specific failure that is not plain I/O.
    #[error("backend failure: {message}")]
    Backend {
        /// The underlying error message.
        message: String,
    },

    /// A queued outbound frame was discarded because an earlier in-flight
    /// write failed or the connection closed before it could be sent.
    #[error("frame dropped: {reason}")]
    Dropped {
        /// Why the frame never reached the wire.
        reason: String,
    },
}

impl TransportError {
    /// Wraps an I/O-flavored failure, rendering it to a message.
    pub fn io(err: impl std::fmt::Display) -> Self {
        TransportError::Io {
            message: err.to_string(),
        }
    }

    /// Wraps a backend-specific failure, rendering it to a message.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        TransportError::Backend {
            message: err.to_string(),
        }
    }

    pub(crate) fn dropped(reason: impl Into<String>) -> Self {
        TransportError::Dropped {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use gangway::TransportError;
    ///
    /// let err = TransportError::io("connection reset by peer");
    /// assert_eq!(err.as_label(), "transport_io");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Io { .. } => "transport_io",
            TransportError::Backend { .. } => "transport_backend",
            TransportError::Dropped { .. } => "transport_dropped",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TransportError::Io { message } => format!("i/o: {message}"),
            TransportError::Backend { message } => format!("backend: {message}"),
            TransportError::Dropped { reason } => format!("dropped: {reason}"),
        }
    }

    /// Indicates whether this error describes a frame that never reached the
    /// wire, as opposed to a failure of the transport itself.
    ///
    /// # Example
    /// ```
    /// use gangway::TransportError;
    ///
    /// assert!(!TransportError::io("reset").is_dropped_frame());
    /// ```
    pub fn is_dropped_frame(&self) -> bool {
        matches!(self, TransportError::Dropped { .. })
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::io(err)
    }
}
