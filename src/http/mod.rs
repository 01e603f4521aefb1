//! HTTP message layer.
//!
//! # Data Flow
//! ```text
//! raw client bytes
//!     → request.rs (parse start line, headers; derive host and cache key)
//!     → [rewrite rules, cache lookup, origin round trip]
//! raw origin bytes
//!     → response.rs (parse status line, headers, body)
//!     → encode → client
//!
//! Shared:
//!     message.rs (head/body framing), headers.rs (ordered header map),
//!     date.rs (freshness ordinal for If-Modified-Since / Last-Modified)
//! ```
//!
//! # Design Decisions
//! - Parsing is permissive and never fails; messages carry a validity flag
//! - An invalid message encodes to exactly the bytes it was parsed from
//! - A valid message encodes byte-for-byte like its input unless rewritten

pub mod date;
pub mod headers;
pub mod message;
pub mod request;
pub mod response;

pub use date::{DateError, HttpDate};
pub use headers::Headers;
pub use message::ParseError;
pub use request::Request;
pub use response::Response;

/// Fixed reply for requests that cannot be parsed.
pub const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\r\n";
