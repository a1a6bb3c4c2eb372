//! The stand-in native object the mock transports expose.

/// What a real backend would surface through the `native` escape hatch: its
/// own request/response/socket object. The mocks expose this marker type
/// instead, so tests can assert that the hatch resolves the right type and
/// refuses the wrong one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeHandle {
    /// Identifies the mock connection; fixed per transport instance.
    pub id: u64,
}

impl NativeHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self { id }
    }
}
