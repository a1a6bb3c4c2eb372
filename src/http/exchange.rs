//! # Server-side HTTP exchange: one request/response pairing.
//!
//! [`ServerHttpExchange`] is the portable face of a single HTTP request and
//! its response, independent of which backend runtime parsed the request.
//! The backend feeds it through a narrow contract
//! ([`HttpTransport`](super::transport::HttpTransport)); applications
//! subscribe to its signals and drive the response.
//!
//! ## Architecture
//! ```text
//!                 application callbacks
//!        ▲ chunk  ▲ end  ▲ body  ▲ close  ▲ error
//!        │        │      │       │        │            (Signal fires)
//!   ┌────┴────────┴──────┴───────┴────────┴────┐
//!   │            ServerHttpExchange            │
//!   │  phase: Idle → Reading → Ended → Closed  │
//!   │  wrote / response_ended / write charset  │
//!   └────┬──────────────────────────────▲──────┘
//!        │ set_status set_header        │ handle_chunk handle_end
//!        │ write end          (ReadFeed)│ handle_close handle_error
//!   ┌────▼──────────────────────────────┴──────┐
//!   │              HttpTransport               │ one impl per backend
//!   └───────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - **Headers freeze at the first write**: `set_status`/`set_header` after
//!   any `write` return [`HttpError::ResponseStarted`].
//! - **`end` is idempotent**: one terminal write reaches the transport no
//!   matter how often `end()` is called.
//! - **Close fires exactly once**, after the response has ended and the
//!   request side is settled (fully read, or never read at all), or
//!   immediately when the transport reports an abort. Chunk, end, body and
//!   error signals are disabled first, so close is the last delivery.
//! - **Text is encoded with the captured charset**: whatever `charset=` the
//!   `content-type` response header carried when it was set (ISO-8859-1
//!   when absent); the request body decodes by the same rule, keyed off the
//!   request's `content-type`.
//! - **Closed means inert**: every call on a closed exchange is a silent
//!   no-op (terminal races are normal, not errors).

use std::any::{Any, TypeId};
use std::sync::{Arc, Mutex, Weak};

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use tracing::{trace, warn};

use crate::error::{HttpError, TransportError};
use crate::signal::{lock_unpoisoned, Signal};

use super::body::{Accumulator, Payload};
use super::charset::{Charset, TextDecoder};
use super::transport::{HttpTransport, ReadFeed, ReadMode};

/// Immutable request metadata, captured when the backend accepted the
/// request and handed it to the exchange.
#[derive(Clone, Debug)]
pub struct RequestHead {
    method: Method,
    uri: String,
    headers: HeaderMap,
}

impl RequestHead {
    /// Builds a head from parsed request data.
    pub fn new(method: Method, uri: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers,
        }
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URI as the backend presented it.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The full request header map.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, case-insensitively.
    ///
    /// Values that are not visible ASCII are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values of a header, in arrival order.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Distinct header names, lowercased.
    pub fn names(&self) -> Vec<&str> {
        self.headers.keys().map(|n| n.as_str()).collect()
    }
}

/// Request-side lifecycle of an exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Constructed; the body read has not been triggered.
    Idle,
    /// The backend read path is active; chunks may arrive.
    Reading,
    /// The backend delivered the whole body.
    Ended,
    /// Terminal: close fired, everything else is inert.
    Closed,
}

struct HttpState {
    phase: Phase,
    wrote: bool,
    response_ended: bool,
    write_charset: Charset,
    decoder: Option<TextDecoder>,
    assembly_wired: bool,
}

impl HttpState {
    fn close_ready(&self) -> bool {
        self.response_ended && matches!(self.phase, Phase::Idle | Phase::Ended)
    }
}

pub(crate) struct HttpShared {
    weak_self: Weak<HttpShared>,
    head: RequestHead,
    transport: Box<dyn HttpTransport>,
    state: Mutex<HttpState>,
    chunk: Signal<Payload>,
    end: Signal<()>,
    body: Signal<Payload>,
    close: Signal<()>,
    error: Signal<TransportError>,
}

impl HttpShared {
    fn feed(&self) -> ReadFeed {
        ReadFeed {
            shared: self.weak_self.clone(),
        }
    }

    fn request_content_type(&self) -> Option<&str> {
        self.head.header("content-type")
    }

    /// Starts the backend read path once; later calls are no-ops.
    fn start_read(&self) {
        let text_mode = {
            let mut state = lock_unpoisoned(&self.state);
            if state.phase != Phase::Idle {
                return;
            }
            state.phase = Phase::Reading;
            if let Some(charset) = Charset::for_text_body(self.request_content_type()) {
                state.decoder = Some(TextDecoder::new(charset));
            }
            state.decoder.is_some()
        };
        trace!(uri = %self.head.uri(), text = text_mode, "request read started");
        self.transport.begin_read(self.feed());
    }

    /// Wires chunk buffering so the body signal can fire the assembled
    /// whole at end-of-body. Idempotent; a no-op once closed.
    fn ensure_assembly(&self) {
        {
            let mut state = lock_unpoisoned(&self.state);
            if state.assembly_wired || state.phase == Phase::Closed {
                return;
            }
            state.assembly_wired = true;
        }
        let text = Charset::for_text_body(self.request_content_type()).is_some();
        let accumulator = Arc::new(Mutex::new(Accumulator::new(text)));

        let buffer = Arc::clone(&accumulator);
        self.chunk.subscribe(move |chunk| {
            lock_unpoisoned(&buffer).push(chunk);
        });

        // The end signal replays, so assembly wired after end-of-body still
        // fires the body signal with whatever was buffered.
        let weak = self.weak_self.clone();
        self.end.subscribe(move |_| {
            if let Some(shared) = weak.upgrade() {
                let body = lock_unpoisoned(&accumulator).finish();
                shared.body.emit(body);
            }
        });
    }

    pub(crate) fn handle_chunk(&self, data: Bytes) {
        let payload = {
            let mut state = lock_unpoisoned(&self.state);
            match state.phase {
                Phase::Closed => return,
                Phase::Idle => {
                    warn!("body chunk before the read was started; dropping");
                    return;
                }
                Phase::Reading | Phase::Ended => {}
            }
            match state.decoder.as_mut() {
                Some(decoder) => {
                    let text = decoder.push(&data);
                    if text.is_empty() {
                        None
                    } else {
                        Some(Payload::Text(text))
                    }
                }
                None => Some(Payload::Binary(data)),
            }
        };
        if let Some(payload) = payload {
            trace!(len = payload.len(), "request chunk");
            self.chunk.emit(payload);
        }
    }

    pub(crate) fn handle_end(&self) {
        let flushed = {
            let mut state = lock_unpoisoned(&self.state);
            match state.phase {
                Phase::Closed | Phase::Ended => return,
                Phase::Idle | Phase::Reading => {}
            }
            state.phase = Phase::Ended;
            state
                .decoder
                .as_mut()
                .map(TextDecoder::finish)
                .filter(|tail| !tail.is_empty())
        };
        if let Some(tail) = flushed {
            self.chunk.emit(Payload::Text(tail));
        }
        trace!(uri = %self.head.uri(), "request ended");
        self.end.emit(());
        self.maybe_finish();
    }

    fn maybe_finish(&self) {
        let ready = lock_unpoisoned(&self.state).close_ready();
        if ready {
            self.finish();
        }
    }

    /// Terminal transition. Disables every other signal, then fires close,
    /// so close is the last notification any subscriber sees.
    pub(crate) fn finish(&self) {
        {
            let mut state = lock_unpoisoned(&self.state);
            if state.phase == Phase::Closed {
                return;
            }
            state.phase = Phase::Closed;
        }
        trace!(uri = %self.head.uri(), "exchange closed");
        self.chunk.disable();
        self.end.disable();
        self.body.disable();
        self.error.disable();
        self.close.emit(());
    }

    pub(crate) fn report_error(&self, err: TransportError) {
        warn!(uri = %self.head.uri(), error = %err, label = err.as_label(), "transport failure");
        self.error.emit(err);
    }
}

/// Portable server-side HTTP exchange.
///
/// Cheap to clone: clones share one underlying exchange, which is how
/// bridge glue hands the same instance to native callbacks and to the
/// application. All methods take `&self`.
///
/// Constructed by backend glue via [`ServerHttpExchange::new`] with the
/// parsed [`RequestHead`] and that backend's
/// [`HttpTransport`](super::transport::HttpTransport). See the
/// [module docs](self) for lifecycle rules.
#[derive(Clone)]
pub struct ServerHttpExchange {
    shared: Arc<HttpShared>,
}

impl ServerHttpExchange {
    /// Creates an exchange over a backend transport.
    ///
    /// With [`ReadMode::Eager`] the read path starts here, with body
    /// assembly pre-wired, so synchronous backends can deliver the whole
    /// body before the application subscribes without losing it.
    pub fn new(head: RequestHead, transport: Box<dyn HttpTransport>) -> Self {
        let eager = transport.read_mode() == ReadMode::Eager;
        let shared = Arc::new_cyclic(|weak| HttpShared {
            weak_self: weak.clone(),
            head,
            transport,
            state: Mutex::new(HttpState {
                phase: Phase::Idle,
                wrote: false,
                response_ended: false,
                write_charset: Charset::DEFAULT,
                decoder: None,
                assembly_wired: false,
            }),
            chunk: Signal::plain(),
            end: Signal::latched(),
            body: Signal::latched(),
            close: Signal::latched(),
            error: Signal::plain(),
        });
        trace!(
            method = %shared.head.method(),
            uri = %shared.head.uri(),
            eager,
            "exchange opened"
        );
        if eager {
            shared.ensure_assembly();
            shared.start_read();
        }
        Self { shared }
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        self.shared.head.method()
    }

    /// Request URI.
    pub fn uri(&self) -> &str {
        self.shared.head.uri()
    }

    /// First value of a request header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.shared.head.header(name)
    }

    /// All values of a request header, in arrival order.
    pub fn headers(&self, name: &str) -> Vec<&str> {
        self.shared.head.header_values(name)
    }

    /// Distinct request header names, lowercased.
    pub fn header_names(&self) -> Vec<&str> {
        self.shared.head.names()
    }

    /// Triggers the backend body read. Idempotent.
    ///
    /// [`body_action`](Self::body_action) calls this implicitly; call it
    /// directly when consuming the body via
    /// [`chunk_action`](Self::chunk_action) alone.
    pub fn read(&self) {
        self.shared.start_read();
    }

    /// Subscribes to raw body chunks (streaming consumption).
    ///
    /// Subscribe before triggering the read if every chunk matters.
    pub fn chunk_action<F>(&self, f: F)
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        self.shared.chunk.subscribe(f);
    }

    /// Subscribes to end-of-body. Replays for late subscribers.
    pub fn end_action<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.end.subscribe(move |_| f());
    }

    /// Subscribes to the assembled body, triggering the read if needed.
    ///
    /// The body arrives as text when the request `content-type` starts
    /// with `text/` (decoded per its `charset=`, ISO-8859-1 by default),
    /// otherwise as raw bytes. Fires once; replays for late subscribers.
    pub fn body_action<F>(&self, f: F)
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        self.shared.ensure_assembly();
        self.shared.start_read();
        self.shared.body.subscribe(f);
    }

    /// Subscribes to the terminal close notification. Replays if the
    /// exchange already closed.
    pub fn close_action<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.close.subscribe(move |_| f());
    }

    /// Subscribes to transport failures.
    pub fn error_action<F>(&self, f: F)
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        self.shared.error.subscribe(f);
    }

    /// Sets the response status.
    ///
    /// Fails with [`HttpError::ResponseStarted`] after the first write;
    /// silently inert once closed.
    pub fn set_status(&self, status: StatusCode) -> Result<(), HttpError> {
        {
            let state = lock_unpoisoned(&self.shared.state);
            if state.phase == Phase::Closed {
                return Ok(());
            }
            if state.wrote {
                return Err(HttpError::ResponseStarted {
                    operation: "set_status",
                });
            }
        }
        trace!(status = %status, "set response status");
        if let Err(err) = self.shared.transport.set_status(status) {
            self.shared.report_error(err);
        }
        Ok(())
    }

    /// Sets a response header.
    ///
    /// Setting `content-type` captures the charset used by later
    /// [`write`](Self::write) calls. Fails with
    /// [`HttpError::ResponseStarted`] after the first write and with
    /// [`HttpError::UnsupportedCharset`] for a charset this crate cannot
    /// encode; silently inert once closed.
    pub fn set_header(&self, name: &str, value: &str) -> Result<(), HttpError> {
        {
            let mut state = lock_unpoisoned(&self.shared.state);
            if state.phase == Phase::Closed {
                return Ok(());
            }
            if state.wrote {
                return Err(HttpError::ResponseStarted {
                    operation: "set_header",
                });
            }
            if name.eq_ignore_ascii_case("content-type") {
                match Charset::from_content_type(value) {
                    Ok(charset) => state.write_charset = charset,
                    Err(bad) => return Err(HttpError::UnsupportedCharset { name: bad }),
                }
            }
        }
        trace!(name, value, "set response header");
        if let Err(err) = self.shared.transport.set_header(name, value) {
            self.shared.report_error(err);
        }
        Ok(())
    }

    /// Sets a multi-valued response header, joined with `", "` per the
    /// HTTP header-folding rule.
    pub fn set_header_values<I, S>(&self, name: &str, values: I) -> Result<(), HttpError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join(", ");
        self.set_header(name, &joined)
    }

    /// Writes a text chunk, encoded with the captured response charset.
    ///
    /// The first write freezes status and headers.
    pub fn write(&self, text: &str) {
        let charset = {
            let mut state = lock_unpoisoned(&self.shared.state);
            if state.phase == Phase::Closed || state.response_ended {
                warn!("write after the response ended; dropping");
                return;
            }
            state.wrote = true;
            state.write_charset
        };
        trace!(len = text.len(), charset = charset.label(), "write text chunk");
        if let Err(err) = self.shared.transport.write(charset.encode(text)) {
            self.shared.report_error(err);
        }
    }

    /// Writes a raw binary chunk. The first write freezes status and
    /// headers.
    pub fn write_bytes(&self, data: impl Into<Bytes>) {
        let data = data.into();
        {
            let mut state = lock_unpoisoned(&self.shared.state);
            if state.phase == Phase::Closed || state.response_ended {
                warn!("write after the response ended; dropping");
                return;
            }
            state.wrote = true;
        }
        trace!(len = data.len(), "write binary chunk");
        if let Err(err) = self.shared.transport.write(data) {
            self.shared.report_error(err);
        }
    }

    /// Completes the response. Idempotent.
    ///
    /// Fires close once both directions are settled: the request was fully
    /// read, or was never read at all.
    pub fn end(&self) {
        let ready = {
            let mut state = lock_unpoisoned(&self.shared.state);
            if state.phase == Phase::Closed || state.response_ended {
                return;
            }
            state.response_ended = true;
            state.close_ready()
        };
        trace!(uri = %self.shared.head.uri(), "response ended");
        if let Err(err) = self.shared.transport.end() {
            self.shared.report_error(err);
        }
        if ready {
            self.shared.finish();
        }
    }

    /// Writes the final chunk and completes the response.
    pub fn end_with(&self, text: &str) {
        self.write(text);
        self.end();
    }

    /// Entry point for backend glue: one slice of raw body bytes.
    pub fn handle_chunk(&self, data: impl Into<Bytes>) {
        self.shared.handle_chunk(data.into());
    }

    /// Entry point for backend glue: the body is fully delivered.
    pub fn handle_end(&self) {
        self.shared.handle_end();
    }

    /// Entry point for backend glue: the native connection is gone
    /// (graceful completion or abort). Forces the terminal close.
    pub fn handle_close(&self) {
        self.shared.finish();
    }

    /// Entry point for backend glue: a native failure tied to this
    /// exchange. Forwarded to the error signal; silent once closed.
    pub fn handle_error(&self, err: TransportError) {
        self.shared.report_error(err);
    }

    /// Escape hatch to the backend's native object, or `None` when this
    /// backend cannot expose a `T`.
    pub fn native<T: Any>(&self) -> Option<&T> {
        self.shared.transport.native(TypeId::of::<T>())?.downcast_ref()
    }
}

impl std::fmt::Debug for ServerHttpExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock_unpoisoned(&self.shared.state);
        f.debug_struct("ServerHttpExchange")
            .field("method", self.shared.head.method())
            .field("uri", &self.shared.head.uri())
            .field("phase", &state.phase)
            .field("response_ended", &state.response_ended)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{HttpCall, MockHttpTransport, NativeHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn head_with(headers: &[(&'static str, &'static str)]) -> RequestHead {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(
                http::header::HeaderName::from_static(name),
                http::header::HeaderValue::from_static(value),
            );
        }
        RequestHead::new(Method::POST, "/greet", map)
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&hits);
        (hits, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_request_head_lookup_is_case_insensitive() {
        let head = head_with(&[("x-transport", "polling"), ("x-transport", "stream")]);
        let exchange = ServerHttpExchange::new(head, MockHttpTransport::new().boxed());

        assert_eq!(exchange.header("X-Transport"), Some("polling"));
        assert_eq!(exchange.headers("x-transport"), vec!["polling", "stream"]);
        assert_eq!(exchange.header_names(), vec!["x-transport"]);
        assert_eq!(exchange.method(), &Method::POST);
        assert_eq!(exchange.uri(), "/greet");
    }

    #[test]
    fn test_set_header_after_write_is_rejected() {
        let mock = MockHttpTransport::new();
        let exchange = ServerHttpExchange::new(head_with(&[]), mock.boxed());

        exchange.set_header("x-token", "1").unwrap();
        exchange.write("partial");
        assert_eq!(
            exchange.set_header("x-token", "2"),
            Err(HttpError::ResponseStarted {
                operation: "set_header"
            })
        );
        assert_eq!(
            exchange.set_status(StatusCode::NOT_FOUND),
            Err(HttpError::ResponseStarted {
                operation: "set_status"
            })
        );
    }

    #[test]
    fn test_end_is_idempotent_and_closes_once() {
        let mock = MockHttpTransport::new();
        let exchange = ServerHttpExchange::new(head_with(&[]), mock.boxed());
        let (closes, on_close) = counter();
        exchange.close_action(on_close);

        exchange.end();
        exchange.end();
        exchange.end();

        let ends = mock
            .calls()
            .iter()
            .filter(|c| matches!(c, HttpCall::End))
            .count();
        assert_eq!(ends, 1, "exactly one terminal write must reach the transport");
        assert_eq!(closes.load(Ordering::SeqCst), 1, "close must fire exactly once");
    }

    #[test]
    fn test_close_action_after_close_replays() {
        let mock = MockHttpTransport::new();
        let exchange = ServerHttpExchange::new(head_with(&[]), mock.boxed());
        exchange.end();

        let (closes, on_close) = counter();
        exchange.close_action(on_close);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_write_text_encodes_with_default_latin1() {
        let mock = MockHttpTransport::new();
        let exchange = ServerHttpExchange::new(head_with(&[]), mock.boxed());

        exchange.set_header("content-type", "text/plain").unwrap();
        exchange.write("abc");
        exchange.end();

        assert_eq!(
            mock.calls(),
            vec![
                HttpCall::Header("content-type".into(), "text/plain".into()),
                HttpCall::Write(Bytes::from_static(b"abc")),
                HttpCall::End,
            ]
        );
    }

    #[test]
    fn test_write_text_encodes_with_captured_utf8() {
        let mock = MockHttpTransport::new();
        let exchange = ServerHttpExchange::new(head_with(&[]), mock.boxed());

        exchange
            .set_header("content-type", "text/plain; charset=UTF-8")
            .unwrap();
        exchange.write("héllo");

        let writes: Vec<_> = mock
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                HttpCall::Write(bytes) => Some(bytes),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec![Bytes::from("héllo".as_bytes().to_vec())]);
    }

    #[test]
    fn test_unsupported_response_charset_is_rejected() {
        let exchange =
            ServerHttpExchange::new(head_with(&[]), MockHttpTransport::new().boxed());
        assert_eq!(
            exchange.set_header("content-type", "text/plain; charset=ebcdic"),
            Err(HttpError::UnsupportedCharset {
                name: "ebcdic".into()
            })
        );
    }

    #[test]
    fn test_multi_value_header_joins_with_comma_space() {
        let mock = MockHttpTransport::new();
        let exchange = ServerHttpExchange::new(head_with(&[]), mock.boxed());
        exchange
            .set_header_values("cache-control", ["no-cache", "no-store"])
            .unwrap();
        assert_eq!(
            mock.calls(),
            vec![HttpCall::Header(
                "cache-control".into(),
                "no-cache, no-store".into()
            )]
        );
    }

    #[test]
    fn test_body_without_content_type_assembles_raw_bytes() {
        let mock = MockHttpTransport::new();
        let exchange = ServerHttpExchange::new(head_with(&[]), mock.boxed());

        let bodies = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&bodies);
        exchange.body_action(move |body| sink.lock().unwrap().push(body.clone()));

        let feed = mock.feed().expect("read must have started");
        feed.chunk(Bytes::from_static(&[0x01, 0x02]));
        feed.chunk(Bytes::from_static(&[0x03]));
        feed.end();

        assert_eq!(
            *bodies.lock().unwrap(),
            vec![Payload::Binary(Bytes::from_static(&[1, 2, 3]))],
            "body must fire once with the exact byte sequence"
        );
    }

    #[test]
    fn test_text_body_decodes_across_chunk_boundaries() {
        let mock = MockHttpTransport::new();
        let head = head_with(&[("content-type", "text/plain; charset=utf-8")]);
        let exchange = ServerHttpExchange::new(head, mock.boxed());

        let bodies = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&bodies);
        exchange.body_action(move |body| sink.lock().unwrap().push(body.clone()));

        // "é" split across chunks: 0xC3 | 0xA9.
        let feed = mock.feed().expect("read must have started");
        feed.chunk(&b"h\xC3"[..]);
        feed.chunk(&b"\xA9llo"[..]);
        feed.end();

        assert_eq!(
            *bodies.lock().unwrap(),
            vec![Payload::Text("héllo".into())]
        );
    }

    #[test]
    fn test_body_action_after_end_still_receives_body() {
        let mock = MockHttpTransport::new();
        let head = head_with(&[("content-type", "text/plain")]);
        let exchange = ServerHttpExchange::new(head, mock.boxed());

        exchange.read();
        let feed = mock.feed().expect("read must have started");
        feed.chunk(&b"late"[..]);
        feed.end();

        let bodies = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&bodies);
        exchange.body_action(move |body| sink.lock().unwrap().push(body.clone()));

        // Chunks fired before assembly was wired are gone, but the replayed
        // end still fires the body signal with what was buffered since.
        assert_eq!(bodies.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_eager_mode_loses_no_chunks() {
        let mock = MockHttpTransport::eager()
            .script_chunk(&b"syn"[..])
            .script_chunk(&b"chronous"[..])
            .script_end();
        let head = head_with(&[("content-type", "text/plain")]);
        let exchange = ServerHttpExchange::new(head, mock.boxed());

        // The whole body was delivered inside the constructor; a late
        // subscriber must still see it via replay.
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&bodies);
        exchange.body_action(move |body| sink.lock().unwrap().push(body.clone()));

        assert_eq!(
            *bodies.lock().unwrap(),
            vec![Payload::Text("synchronous".into())]
        );
    }

    #[test]
    fn test_close_waits_for_both_directions() {
        let mock = MockHttpTransport::new();
        let exchange = ServerHttpExchange::new(head_with(&[]), mock.boxed());
        let (closes, on_close) = counter();
        exchange.close_action(on_close);

        exchange.read();
        exchange.end();
        assert_eq!(
            closes.load(Ordering::SeqCst),
            0,
            "close must wait for the request side once a read started"
        );

        let feed = mock.feed().expect("read must have started");
        feed.end();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transport_abort_closes_immediately_and_disables_signals() {
        let mock = MockHttpTransport::new();
        let exchange = ServerHttpExchange::new(head_with(&[]), mock.boxed());
        let (closes, on_close) = counter();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        exchange.close_action(on_close);
        exchange.error_action(move |e| sink.lock().unwrap().push(e.clone()));

        exchange.handle_close();
        exchange.handle_close();
        exchange.handle_error(TransportError::io("late reset"));

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(
            errors.lock().unwrap().is_empty(),
            "errors after close must be suppressed"
        );
    }

    #[test]
    fn test_write_failure_reaches_error_action_not_caller() {
        let mock = MockHttpTransport::new();
        let exchange = ServerHttpExchange::new(head_with(&[]), mock.boxed());
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        exchange.error_action(move |e| sink.lock().unwrap().push(e.clone()));

        mock.fail_next_write();
        exchange.write("doomed");

        let seen = errors.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].as_label(), "transport_io");
    }

    #[test]
    fn test_end_with_writes_then_ends() {
        let mock = MockHttpTransport::new();
        let exchange = ServerHttpExchange::new(head_with(&[]), mock.boxed());
        exchange.end_with("bye");
        assert_eq!(
            mock.calls(),
            vec![HttpCall::Write(Bytes::from_static(b"bye")), HttpCall::End]
        );
    }

    #[test]
    fn test_closed_exchange_is_inert() {
        let mock = MockHttpTransport::new();
        let exchange = ServerHttpExchange::new(head_with(&[]), mock.boxed());
        exchange.handle_close();

        assert_eq!(exchange.set_status(StatusCode::OK), Ok(()));
        assert_eq!(exchange.set_header("x", "y"), Ok(()));
        exchange.write("ignored");
        exchange.end();

        assert!(
            mock.calls().is_empty(),
            "a closed exchange must not touch the transport"
        );
    }

    #[test]
    fn test_native_escape_hatch() {
        let mock = MockHttpTransport::new();
        let exchange = ServerHttpExchange::new(head_with(&[]), mock.boxed());
        let native = exchange.native::<NativeHandle>();
        assert!(native.is_some());
        assert!(exchange.native::<String>().is_none());
    }

    #[test]
    fn test_chunk_action_streams_without_assembly() {
        let mock = MockHttpTransport::new();
        let head = head_with(&[("content-type", "text/plain")]);
        let exchange = ServerHttpExchange::new(head, mock.boxed());

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&chunks);
        exchange.chunk_action(move |c| sink.lock().unwrap().push(c.clone()));
        let (ends, on_end) = counter();
        exchange.end_action(on_end);

        exchange.read();
        let feed = mock.feed().expect("read must have started");
        feed.chunk(&b"ab"[..]);
        feed.chunk(&b"c"[..]);
        feed.end();

        assert_eq!(
            *chunks.lock().unwrap(),
            vec![Payload::Text("ab".into()), Payload::Text("c".into())]
        );
        assert_eq!(ends.load(Ordering::SeqCst), 1);
    }
}
