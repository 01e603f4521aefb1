//! Forward HTTP proxy with content rewriting and a conditional-GET cache.

// Message layer
pub mod cache;
pub mod http;
pub mod rewrite;

// Proxy pipeline
pub mod net;
pub mod proxy;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use cache::ResponseCache;
pub use config::ProxyConfig;
pub use error::{ProxyError, TransportError};
pub use http::{HttpDate, Request, Response};
pub use lifecycle::Shutdown;
pub use proxy::{Origin, ProxyController, ProxyServer, TcpOrigin};
pub use rewrite::RewriteRules;
