//! Content rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! config [[rewrite.request]] / [[rewrite.response]]
//!     → rules.rs (compile patterns, reject malformed ones)
//!     → RewriteRules (ordered, shared via ArcSwap by the controller)
//!     → Request::rewrite  (start line, text)
//!     → Response::rewrite (body, bytes, textual content only)
//! ```
//!
//! # Design Decisions
//! - Patterns are compiled once, at registration
//! - Rules apply in insertion order, each replacing every match
//! - Request rules see text, response rules see raw bytes

pub mod rules;

use thiserror::Error;

use crate::http::message::ParseError;

pub use rules::{rewrite_bytes, rewrite_text, ByteRewriteRule, RewriteRule, RewriteRules};

/// Errors raised while registering or applying rewrite rules.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// A pattern failed to compile.
    #[error("invalid rewrite pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The rewritten start line no longer names a forwardable target.
    #[error("rewritten request line has no usable target: {0}")]
    Target(#[from] ParseError),

    /// The message was never parsed successfully.
    #[error("cannot rewrite an invalid message")]
    InvalidMessage,
}
