//! Scripted in-memory backends.
//!
//! This module groups the **test doubles** used by the crate's own tests,
//! the runnable demos, and adapter authors validating a new backend against
//! the exchange/socket contracts. Nothing here touches a real connection:
//! every delegated primitive is recorded, and inbound traffic is injected
//! by the test.
//!
//! ## Contents
//! - [`MockHttpTransport`] records status/header/write/end calls, captures
//!   the read feed, and can replay a scripted body synchronously (eager
//!   backends).
//! - [`MockSocketTransport`] records sent frames and close; in
//!   single-flight mode the test reports write completions explicitly to
//!   exercise the send gate.
//! - [`HttpCall`] / [`SocketCall`] the recorded primitive calls.
//! - [`NativeHandle`] the stand-in "native object" both mocks expose
//!   through the `native` escape hatch.
//!
//! Compiled for the crate's own tests, and for consumers under the `mock`
//! feature.

mod http;
mod native;
mod socket;

pub use http::{HttpCall, MockHttpTransport};
pub use native::NativeHandle;
pub use socket::{MockSocketTransport, SocketCall};
