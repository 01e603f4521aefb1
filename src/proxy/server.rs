//! Accept loop and per-connection dispatch.
//!
//! # Responsibilities
//! - Accept client connections and spawn one task per connection
//! - Read the client request, run it through the controller, reply, close
//! - Apply reloaded configuration to the running controller
//! - Stop accepting on shutdown and drain in-flight connections

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use memchr::memmem;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};

use crate::config::ProxyConfig;
use crate::error::TransportError;
use crate::http::message::HEAD_DELIMITER;
use crate::net::{ConnectionId, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::proxy::controller::ProxyController;
use crate::proxy::origin::{Origin, TcpOrigin};

/// How long shutdown waits for in-flight connections.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Limits on reading a client request.
#[derive(Debug, Clone, Copy)]
struct ReadLimits {
    max_bytes: usize,
    timeout: Duration,
}

/// The forward proxy server.
pub struct ProxyServer<O = TcpOrigin> {
    controller: Arc<ProxyController<O>>,
    tracker: ConnectionTracker,
    limits: ReadLimits,
}

impl<O: Origin> ProxyServer<O> {
    pub fn new(controller: Arc<ProxyController<O>>, config: &ProxyConfig) -> Self {
        Self {
            controller,
            tracker: ConnectionTracker::new(),
            limits: ReadLimits {
                max_bytes: config.listener.max_request_bytes,
                timeout: Duration::from_secs(config.timeouts.read_secs),
            },
        }
    }

    pub fn controller(&self) -> &Arc<ProxyController<O>> {
        &self.controller
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Serve connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: Listener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Proxy server started");
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = self.tracker.track();
                        metrics::record_connection();
                        let controller = Arc::clone(&self.controller);
                        let limits = self.limits;
                        tokio::spawn(async move {
                            serve_connection(&controller, stream, peer, guard.id(), limits).await;
                            drop(permit);
                            drop(guard);
                        });
                    }
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                    }
                    Err(e) => return Err(e),
                },
                Some(config) = config_updates.recv() => {
                    match self.controller.apply_config(&config) {
                        Ok(()) => tracing::info!(
                            request_rules = config.rewrite.request.len(),
                            response_rules = config.rewrite.response.len(),
                            keep_alive = config.proxy.keep_alive,
                            use_cache = config.proxy.use_cache,
                            "Configuration reloaded"
                        ),
                        Err(e) => tracing::error!(error = %e, "Rejected reloaded configuration"),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
            }
        }

        if !self.tracker.wait_for_drain(DRAIN_TIMEOUT).await {
            tracing::warn!(
                active = self.tracker.active_count(),
                "Connections still open after drain timeout"
            );
        }
        tracing::info!("Proxy server stopped");
        Ok(())
    }
}

async fn serve_connection<O: Origin>(
    controller: &ProxyController<O>,
    mut stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
    limits: ReadLimits,
) {
    tracing::info!(connection_id = %id, peer = %peer, "New connection");

    let raw = match read_request(&mut stream, limits).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(connection_id = %id, peer = %peer, error = %e, "Could not receive data");
            return;
        }
    };

    match controller.handle(raw, id).await {
        Ok(reply) => match stream.write_all(&reply).await {
            Ok(()) => tracing::info!(
                connection_id = %id,
                peer = %peer,
                bytes = reply.len(),
                "The response was sent to the client"
            ),
            Err(e) => tracing::warn!(connection_id = %id, error = %e, "Failed to reply to client"),
        },
        Err(e) => {
            tracing::warn!(connection_id = %id, error = %e, "Connection abandoned");
        }
    }

    let _ = stream.shutdown().await;
}

/// Read a client request: until the head is complete, the client stops
/// sending, or `max_bytes` have arrived.
async fn read_request(stream: &mut TcpStream, limits: ReadLimits) -> Result<Bytes, TransportError> {
    let mut buf = BytesMut::with_capacity(4096);
    while buf.len() < limits.max_bytes {
        buf.reserve(4096);
        let n = tokio::time::timeout(limits.timeout, stream.read_buf(&mut buf))
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "client read",
                after: limits.timeout,
            })?
            .map_err(TransportError::Receive)?;

        if n == 0 || memmem::find(&buf, HEAD_DELIMITER).is_some() {
            break;
        }
    }
    buf.truncate(limits.max_bytes);
    Ok(buf.freeze())
}
