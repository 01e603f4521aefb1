//! Client-side networking.
//!
//! # Data Flow
//! ```text
//! Client TCP connection
//!     → listener.rs (accept, at most max_connections at once)
//!     → connection.rs (id for log correlation, open-connection count)
//!     → proxy::server (one task per client)
//! ```

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
