//! Origin transport.
//!
//! Every forwarded request opens a fresh TCP connection, writes the request
//! and reads until the origin closes. There is no pooling and no reuse.

use std::future::Future;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::ProxyConfig;
use crate::error::TransportError;

const READ_CHUNK: usize = 4096;

/// Something that can carry an encoded request to `host` and return the raw reply.
pub trait Origin: Send + Sync + 'static {
    fn fetch(
        &self,
        host: &str,
        request: Bytes,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;
}

/// Plain TCP origin transport.
#[derive(Debug, Clone)]
pub struct TcpOrigin {
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TcpOrigin {
    pub fn new(port: u16, connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            port,
            connect_timeout,
            read_timeout,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(
            config.proxy.origin_port,
            Duration::from_secs(config.timeouts.connect_secs),
            Duration::from_secs(config.timeouts.read_secs),
        )
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for TcpOrigin {
    fn default() -> Self {
        Self::from_config(&ProxyConfig::default())
    }
}

impl Origin for TcpOrigin {
    async fn fetch(&self, host: &str, request: Bytes) -> Result<Bytes, TransportError> {
        // Origins are always dialled on the configured port.
        let name = host.split(':').next().unwrap_or(host);

        let mut stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((name, self.port)),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            operation: "connect",
            after: self.connect_timeout,
        })?
        .map_err(|source| TransportError::Connect {
            host: host.to_string(),
            source,
        })?;

        stream
            .write_all(&request)
            .await
            .map_err(|source| TransportError::Send {
                host: host.to_string(),
                source,
            })?;

        tracing::debug!(host, bytes = request.len(), "Request sent to origin");
        Ok(read_until_close(&mut stream, self.read_timeout).await)
    }
}

/// Read until the peer closes.
///
/// A read error or timeout ends the read; whatever arrived so far is returned.
pub async fn read_until_close<R>(reader: &mut R, read_timeout: Duration) -> Bytes
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    loop {
        buf.reserve(READ_CHUNK);
        match tokio::time::timeout(read_timeout, reader.read_buf(&mut buf)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(_)) => continue,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, received = buf.len(), "Failed to receive response");
                break;
            }
            Err(_) => {
                tracing::warn!(received = buf.len(), "Timed out receiving response");
                break;
            }
        }
    }
    buf.freeze()
}
