//! Origin response parsing and rewriting.
//!
//! # Responsibilities
//! - Parse raw origin bytes into status line, headers and body
//! - Rewrite textual bodies, leave everything else untouched
//! - Encode back to bytes; garbage from the origin is relayed as-is

use bytes::Bytes;

use crate::http::headers::Headers;
use crate::http::message::{self, ParseError};
use crate::rewrite::{rewrite_bytes, ByteRewriteRule, RewriteError};

/// A parsed (or unparseable) HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    raw: Bytes,
    line: String,
    status_code: String,
    headers: Headers,
    body: Bytes,
    error: Option<ParseError>,
}

impl Response {
    /// Parse a raw response. Never fails; check [`Response::is_valid`].
    pub fn parse(raw: impl Into<Bytes>) -> Self {
        let raw = raw.into();
        let mut response = Self {
            raw: raw.clone(),
            line: String::new(),
            status_code: String::new(),
            headers: Headers::new(),
            body: Bytes::new(),
            error: None,
        };

        if let Err(e) = response.parse_into(&raw) {
            tracing::trace!(error = %e, "Response failed to parse");
            response.error = Some(e);
        }
        response
    }

    fn parse_into(&mut self, raw: &Bytes) -> Result<(), ParseError> {
        let (head, body) = message::split_head(raw).ok_or(ParseError::MissingDelimiter)?;
        let body = raw.slice_ref(body);
        let head = message::parse_head(head)?;

        let status_code = head
            .start_line
            .splitn(3, ' ')
            .nth(1)
            .ok_or_else(|| ParseError::StartLine(head.start_line.clone()))?
            .to_string();

        self.status_code = status_code;
        self.line = head.start_line;
        self.headers = head.headers;
        self.body = body;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Why parsing failed, if it did.
    pub fn parse_error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    /// The full status line.
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn status_code(&self) -> &str {
        &self.status_code
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Whether the response declares textual content.
    ///
    /// A plain substring test on `Content-Type`, not a media type parse.
    pub fn is_textual(&self) -> bool {
        self.headers
            .get("Content-Type")
            .is_some_and(|value| value.contains("text"))
    }

    /// Apply body rules in order if the content is textual.
    ///
    /// Returns whether the rules ran. Headers and status line are never touched.
    pub fn rewrite(&mut self, rules: &[ByteRewriteRule]) -> Result<bool, RewriteError> {
        if !self.is_valid() {
            return Err(RewriteError::InvalidMessage);
        }
        if !self.is_textual() {
            return Ok(false);
        }

        self.body = Bytes::from(rewrite_bytes(rules, &self.body));
        Ok(true)
    }

    /// Serialize for the wire. Invalid responses return the original bytes.
    pub fn encode(&self) -> Bytes {
        if !self.is_valid() {
            return self.raw.clone();
        }
        message::encode(&self.line, &self.headers, &self.body)
    }
}
