//! Server-side HTTP: one exchange per request/response pairing.
//!
//! This module groups the HTTP half of the crate: the portable exchange
//! state machine, the backend contract it delegates to, and the body
//! plumbing between them.
//!
//! ## Contents
//! - [`ServerHttpExchange`], [`RequestHead`] the exchange and its immutable
//!   request metadata
//! - [`HttpTransport`], [`ReadFeed`], [`ReadMode`] the per-backend contract
//! - [`Payload`] a body chunk or assembled body, text or raw bytes
//!
//! ## Quick wiring
//! ```text
//! backend glue ─► ServerHttpExchange::new(RequestHead, Box<dyn HttpTransport>)
//!                   │ write side: set_status/set_header/write/end ─► transport
//!                   └ read side:  transport.begin_read(ReadFeed)
//!                                 feed.chunk(..) / feed.end() ─► signals
//! ```

mod body;
mod charset;
mod exchange;
mod transport;

pub use body::Payload;
pub use exchange::{RequestHead, ServerHttpExchange};
pub use transport::{HttpTransport, ReadFeed, ReadMode};
