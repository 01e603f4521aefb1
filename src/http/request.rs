//! Inbound request parsing and rewriting.
//!
//! # Responsibilities
//! - Parse a raw client buffer into start line, headers and body
//! - Derive the forwarding host and the cache key from the request target
//! - Apply start-line rewrite rules, re-deriving host and key afterwards
//! - Encode back to bytes, passing unparseable input through untouched

use bytes::Bytes;

use crate::http::headers::Headers;
use crate::http::message::{self, ParseError};
use crate::rewrite::{rewrite_text, RewriteError, RewriteRule};

/// A parsed (or unparseable) HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    raw: Bytes,
    method: String,
    line: String,
    headers: Headers,
    body: Bytes,
    target: Target,
    error: Option<ParseError>,
}

/// Where a request should go and what it is keyed under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Target {
    host: String,
    resource_key: String,
}

impl Request {
    /// Parse a raw request. Never fails; check [`Request::is_valid`].
    pub fn parse(raw: impl Into<Bytes>) -> Self {
        let raw = raw.into();
        let mut request = Self {
            raw: raw.clone(),
            method: String::new(),
            line: String::new(),
            headers: Headers::new(),
            body: Bytes::new(),
            target: Target::default(),
            error: None,
        };

        if let Err(e) = request.parse_into(&raw) {
            tracing::trace!(error = %e, "Request failed to parse");
            request.error = Some(e);
        }
        request
    }

    fn parse_into(&mut self, raw: &Bytes) -> Result<(), ParseError> {
        // Without a delimiter the whole buffer is taken as the head.
        let (head, body) = match message::split_head(raw) {
            Some((head, body)) => (head, raw.slice_ref(body)),
            None => (&raw[..], Bytes::new()),
        };
        let head = message::parse_head(head)?;

        let mut tokens = head.start_line.split_whitespace();
        let method = tokens
            .next()
            .ok_or_else(|| ParseError::StartLine(head.start_line.clone()))?;
        let target = tokens
            .next()
            .ok_or_else(|| ParseError::StartLine(head.start_line.clone()))?;

        self.target = derive_target(target)?;
        self.method = method.to_string();
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

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The full request line.
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Network location the request is forwarded to.
    pub fn host(&self) -> &str {
        &self.target.host
    }

    /// Cache key: the request target as written on the request line.
    pub fn resource_key(&self) -> &str {
        &self.target.resource_key
    }

    /// Apply start-line rules in order, then re-derive host and resource key.
    ///
    /// Substitutions are not rolled back if the rewritten line has no usable
    /// target; host and resource key then keep their previous values.
    pub fn rewrite(&mut self, rules: &[RewriteRule]) -> Result<(), RewriteError> {
        if !self.is_valid() {
            return Err(RewriteError::InvalidMessage);
        }

        self.line = rewrite_text(rules, &self.line);
        let target = self
            .line
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| ParseError::StartLine(self.line.clone()))?;
        self.target = derive_target(target)?;
        Ok(())
    }

    /// Serialize for the wire. Invalid requests return the original bytes.
    pub fn encode(&self) -> Bytes {
        if !self.is_valid() {
            return self.raw.clone();
        }
        message::encode(&self.line, &self.headers, &self.body)
    }
}

/// Derive host and cache key from a request target.
///
/// Absolute form (`http://host/path`) takes the host between `//` and the
/// next `/`; anything else is read as authority form with an optional port.
fn derive_target(target: &str) -> Result<Target, ParseError> {
    let host = match absolute_authority(target) {
        Some(authority) => authority.split('/').next().unwrap_or_default(),
        None => target.split(&[':', '/'][..]).next().unwrap_or_default(),
    };

    if host.is_empty() {
        return Err(ParseError::Target(target.to_string()));
    }

    Ok(Target {
        host: host.to_string(),
        resource_key: target.to_string(),
    })
}

/// Everything after `scheme://`, if `target` is in absolute form.
fn absolute_authority(target: &str) -> Option<&str> {
    let (scheme, rest) = target.split_once("://")?;
    let is_scheme = scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    is_scheme.then_some(rest)
}
