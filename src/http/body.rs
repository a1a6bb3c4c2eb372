//! # Body payloads: text or raw bytes.
//!
//! A request body is delivered either as decoded text (media type `text/*`)
//! or as raw bytes, both chunk by chunk and as the assembled whole. The mode
//! is decided once per exchange from the request `content-type`, so every
//! chunk and the final body of one exchange share the same [`Payload`]
//! variant.

use bytes::{Bytes, BytesMut};

/// One unit of body data: a streamed chunk or the fully assembled body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// Decoded text, for `text/*` request bodies.
    Text(String),
    /// Raw bytes, for everything else.
    Binary(Bytes),
}

impl Payload {
    /// Returns the text content, or `None` for binary payloads.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Binary(_) => None,
        }
    }

    /// Returns the binary content, or `None` for text payloads.
    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            Payload::Text(_) => None,
            Payload::Binary(b) => Some(b),
        }
    }

    /// Length in bytes (text length is its UTF-8 byte length).
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(s) => s.len(),
            Payload::Binary(b) => b.len(),
        }
    }

    /// Returns `true` for an empty payload.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Buffers chunks until end-of-body, then yields the assembled [`Payload`].
#[derive(Debug)]
pub(crate) enum Accumulator {
    Text(String),
    Binary(BytesMut),
}

impl Accumulator {
    pub(crate) fn new(text: bool) -> Self {
        if text {
            Accumulator::Text(String::new())
        } else {
            Accumulator::Binary(BytesMut::new())
        }
    }

    pub(crate) fn push(&mut self, chunk: &Payload) {
        match (self, chunk) {
            (Accumulator::Text(buf), Payload::Text(s)) => buf.push_str(s),
            (Accumulator::Binary(buf), Payload::Binary(b)) => buf.extend_from_slice(b),
            // The decode mode is fixed per exchange; mixed chunks cannot occur.
            _ => {}
        }
    }

    pub(crate) fn finish(&mut self) -> Payload {
        match self {
            Accumulator::Text(buf) => Payload::Text(std::mem::take(buf)),
            Accumulator::Binary(buf) => Payload::Binary(std::mem::take(buf).freeze()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_assembles_text_chunks() {
        let mut acc = Accumulator::new(true);
        acc.push(&Payload::Text("hel".into()));
        acc.push(&Payload::Text("lo".into()));
        assert_eq!(acc.finish(), Payload::Text("hello".into()));
    }

    #[test]
    fn test_accumulator_assembles_binary_chunks() {
        let mut acc = Accumulator::new(false);
        acc.push(&Payload::Binary(Bytes::from_static(&[1, 2])));
        acc.push(&Payload::Binary(Bytes::from_static(&[3])));
        assert_eq!(
            acc.finish(),
            Payload::Binary(Bytes::from_static(&[1, 2, 3]))
        );
    }

    #[test]
    fn test_accumulator_finish_on_empty_body() {
        let mut text = Accumulator::new(true);
        assert_eq!(text.finish(), Payload::Text(String::new()));
        let mut binary = Accumulator::new(false);
        assert_eq!(binary.finish(), Payload::Binary(Bytes::new()));
    }

    #[test]
    fn test_payload_accessors() {
        let text = Payload::Text("abc".into());
        assert_eq!(text.as_text(), Some("abc"));
        assert_eq!(text.as_binary(), None);
        assert_eq!(text.len(), 3);

        let binary = Payload::Binary(Bytes::from_static(&[9]));
        assert_eq!(binary.as_text(), None);
        assert!(!binary.is_empty());
    }
}
