//! Framing shared by requests and responses.
//!
//! A message is a head (start line plus header lines, CRLF separated) and an
//! optional body, divided by the first blank line.

use bytes::{BufMut, Bytes, BytesMut};
use memchr::memmem;
use thiserror::Error;

use crate::http::headers::Headers;

/// Separator between head and body.
pub const HEAD_DELIMITER: &[u8] = b"\r\n\r\n";

/// Why a buffer could not be parsed into a message.
///
/// Parsing never fails outright; the error is kept on the message next to
/// its validity flag for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The buffer has no blank line separating head and body.
    #[error("missing header/body delimiter")]
    MissingDelimiter,

    /// The head is not valid UTF-8.
    #[error("message head is not valid UTF-8")]
    InvalidUtf8,

    /// The start line is missing a required token.
    #[error("malformed start line: {0:?}")]
    StartLine(String),

    /// No network location could be derived from the request target.
    #[error("cannot derive host from request target {0:?}")]
    Target(String),
}

/// A decoded head: start line and headers.
#[derive(Debug)]
pub(crate) struct Head {
    pub start_line: String,
    pub headers: Headers,
}

/// Split a raw buffer at the first head/body delimiter.
///
/// Returns `None` when no delimiter is present.
pub(crate) fn split_head(raw: &[u8]) -> Option<(&[u8], &[u8])> {
    memmem::find(raw, HEAD_DELIMITER)
        .map(|at| (&raw[..at], &raw[at + HEAD_DELIMITER.len()..]))
}

/// Decode a head into its start line and headers.
pub(crate) fn parse_head(head: &[u8]) -> Result<Head, ParseError> {
    let text = std::str::from_utf8(head).map_err(|_| ParseError::InvalidUtf8)?;
    let mut lines = text.split("\r\n");
    let start_line = lines.next().unwrap_or_default().to_string();

    let mut headers = Headers::new();
    for line in lines {
        headers.insert_line(line);
    }

    Ok(Head {
        start_line,
        headers,
    })
}

/// Serialize a head and body; the exact inverse of [`split_head`] + [`parse_head`].
pub(crate) fn encode(start_line: &str, headers: &Headers, body: &[u8]) -> Bytes {
    let head_len: usize = headers
        .iter()
        .map(|(name, value)| name.len() + value.len() + 3)
        .sum();
    let mut out = BytesMut::with_capacity(start_line.len() + head_len + body.len() + 4);

    out.put_slice(start_line.as_bytes());
    out.put_slice(b"\r\n");
    for (name, value) in headers.iter() {
        out.put_slice(name.as_bytes());
        out.put_u8(b':');
        out.put_slice(value.as_bytes());
        out.put_slice(b"\r\n");
    }
    out.put_slice(b"\r\n");
    out.put_slice(body);
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_on_first_delimiter_only() {
        let (head, body) = split_head(b"A\r\n\r\nB\r\n\r\nC").unwrap();
        assert_eq!(head, b"A");
        assert_eq!(body, b"B\r\n\r\nC");
    }

    #[test]
    fn split_without_delimiter() {
        assert!(split_head(b"HTTP/1.1 200 OK\r\n").is_none());
    }

    #[test]
    fn head_rejects_invalid_utf8() {
        let err = parse_head(b"GET \xff\xfe x").unwrap_err();
        assert_eq!(err, ParseError::InvalidUtf8);
    }

    #[test]
    fn encode_reverses_parse() {
        let raw = b"HTTP/1.1 200 OK\r\nA: 1\r\nB:2\r\n";
        let head = parse_head(&raw[..raw.len() - 2]).unwrap();
        let encoded = encode(&head.start_line, &head.headers, b"body");
        assert_eq!(&encoded[..], b"HTTP/1.1 200 OK\r\nA: 1\r\nB:2\r\n\r\nbody");
    }
}
