//! Forward proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Listener
//!     → server.rs (one task per connection, read client request)
//!     → controller.rs (parse, rewrite, cache, forward, rewrite, store)
//!     → origin.rs (fresh TCP connection per request, read to EOF)
//!     → server.rs (write reply, close)
//! ```
//!
//! # Design Decisions
//! - A failure in one connection never affects another
//! - No retries: a transport failure ends that exchange
//! - Every socket operation has a deadline

pub mod controller;
pub mod origin;
pub mod server;

pub use controller::ProxyController;
pub use origin::{Origin, TcpOrigin};
pub use server::ProxyServer;
