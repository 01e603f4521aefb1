//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → metrics → controller → config watch → listener
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGINT/SIGTERM → stop accepting → drain open connections → exit
//! ```
//!
//! A rejected configuration or an unbindable address aborts startup; nothing
//! is served until the listener is up.

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
