//! # Text encoding for request bodies and response writes.
//!
//! HTTP exchanges deal in two charsets: UTF-8 and ISO-8859-1 (the HTTP
//! default when a `content-type` names none). A request body is decoded as
//! text only when its media type starts with `text/`; a response write is
//! encoded with whatever charset the `content-type` response header carried
//! at the moment it was set.
//!
//! Decoding is streaming: backends deliver the body in arbitrary slices, so
//! a multi-byte UTF-8 sequence can straddle a chunk boundary. [`TextDecoder`]
//! carries the incomplete tail from one chunk into the next.

use bytes::Bytes;

/// A text encoding an exchange can decode from and encode to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Charset {
    Utf8,
    Latin1,
}

impl Charset {
    /// HTTP's fallback when no `charset=` parameter is present.
    pub(crate) const DEFAULT: Charset = Charset::Latin1;

    /// Resolves a charset name, case-insensitively, tolerating quotes.
    pub(crate) fn parse(name: &str) -> Option<Charset> {
        let name = name.trim().trim_matches('"');
        if name.eq_ignore_ascii_case("utf-8") || name.eq_ignore_ascii_case("utf8") {
            Some(Charset::Utf8)
        } else if name.eq_ignore_ascii_case("iso-8859-1")
            || name.eq_ignore_ascii_case("iso8859-1")
            || name.eq_ignore_ascii_case("latin1")
            || name.eq_ignore_ascii_case("latin-1")
            || name.eq_ignore_ascii_case("us-ascii")
            || name.eq_ignore_ascii_case("ascii")
        {
            Some(Charset::Latin1)
        } else {
            None
        }
    }

    /// Extracts the write charset from a `content-type` header value.
    ///
    /// No `charset=` parameter means [`Charset::DEFAULT`]. An unrecognized
    /// charset name is an error carrying that name: on the response side the
    /// header value comes from the caller, and encoding with a charset this
    /// crate cannot honor would silently corrupt the body.
    pub(crate) fn from_content_type(value: &str) -> Result<Charset, String> {
        match charset_param(value) {
            Some(name) => Charset::parse(name).ok_or_else(|| name.to_string()),
            None => Ok(Charset::DEFAULT),
        }
    }

    /// Decides whether a request body is text, and with which charset.
    ///
    /// Returns `Some` only for `text/*` media types. An unrecognized
    /// `charset=` on the request side falls back to [`Charset::DEFAULT`]
    /// rather than erroring: the value came off the wire, and a readable
    /// best-effort decode beats refusing the body.
    pub(crate) fn for_text_body(content_type: Option<&str>) -> Option<Charset> {
        let value = content_type?;
        let media_type = value.split(';').next().unwrap_or("").trim();
        let is_text =
            media_type.len() >= 5 && media_type.as_bytes()[..5].eq_ignore_ascii_case(b"text/");
        if !is_text {
            return None;
        }
        match charset_param(value) {
            Some(name) => Some(Charset::parse(name).unwrap_or(Charset::DEFAULT)),
            None => Some(Charset::DEFAULT),
        }
    }

    /// Encodes text for the wire.
    ///
    /// ISO-8859-1 maps code points above U+00FF to `?`, matching the lossy
    /// single-byte behavior clients expect from that charset.
    pub(crate) fn encode(self, text: &str) -> Bytes {
        match self {
            Charset::Utf8 => Bytes::from(text.to_owned()),
            Charset::Latin1 => text
                .chars()
                .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
                .collect::<Vec<u8>>()
                .into(),
        }
    }

    /// Canonical lowercase name for logs.
    pub(crate) fn label(self) -> &'static str {
        match self {
            Charset::Utf8 => "utf-8",
            Charset::Latin1 => "iso-8859-1",
        }
    }
}

/// Finds the value of the `charset=` parameter in a `content-type` value.
fn charset_param(value: &str) -> Option<&str> {
    for param in value.split(';').skip(1) {
        if let Some((key, raw)) = param.split_once('=') {
            if key.trim().eq_ignore_ascii_case("charset") {
                return Some(raw.trim());
            }
        }
    }
    None
}

/// Streaming text decoder with carry-over across chunk boundaries.
///
/// UTF-8 input may end mid-sequence; the incomplete tail is held until the
/// next [`push`](Self::push). Invalid sequences decode to U+FFFD so one bad
/// byte never poisons the rest of the body. ISO-8859-1 is a direct byte to
/// code point mapping and never carries.
#[derive(Debug)]
pub(crate) struct TextDecoder {
    charset: Charset,
    carry: Vec<u8>,
}

impl TextDecoder {
    pub(crate) fn new(charset: Charset) -> Self {
        Self {
            charset,
            carry: Vec::new(),
        }
    }

    /// Decodes the next chunk, returning whatever is complete so far.
    pub(crate) fn push(&mut self, input: &[u8]) -> String {
        if self.charset == Charset::Latin1 {
            return input.iter().map(|&b| b as char).collect();
        }

        let joined: Option<Vec<u8>> = if self.carry.is_empty() {
            None
        } else {
            let mut buf = std::mem::take(&mut self.carry);
            buf.extend_from_slice(input);
            Some(buf)
        };
        let mut rest: &[u8] = joined.as_deref().unwrap_or(input);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    if let Ok(s) = std::str::from_utf8(valid) {
                        out.push_str(s);
                    }
                    match err.error_len() {
                        Some(bad) => {
                            out.push('\u{FFFD}');
                            rest = &tail[bad..];
                        }
                        None => {
                            // Incomplete sequence at the end; hold it for the
                            // next chunk.
                            self.carry = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flushes the decoder at end of body.
    ///
    /// A dangling incomplete sequence decodes to a single U+FFFD.
    pub(crate) fn finish(&mut self) -> String {
        if self.carry.is_empty() {
            String::new()
        } else {
            self.carry.clear();
            "\u{FFFD}".to_string()
        }
    }
}
