//! Errors that end a proxied exchange.
//!
//! Parse, rewrite and freshness failures are recovered where they happen;
//! only transport failures reach the connection boundary.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Socket-level failure talking to a client or an origin.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to send request to {host}: {source}")]
    Send {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to receive data from client: {0}")]
    Receive(#[source] io::Error),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

/// Failure handling one proxied connection.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}
