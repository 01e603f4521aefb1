//! Shared utilities for end-to-end tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rewrite_proxy::config::ProxyConfig;
use rewrite_proxy::lifecycle::Shutdown;
use rewrite_proxy::net::Listener;
use rewrite_proxy::{ProxyController, ProxyServer, TcpOrigin};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Requests an origin has received, in arrival order.
#[derive(Clone, Default)]
pub struct Seen(Arc<Mutex<Vec<String>>>);

impl Seen {
    pub fn requests(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

/// Start an origin that answers every connection with `response` and closes.
pub async fn start_mock_origin(response: &'static [u8]) -> (SocketAddr, Seen) {
    start_programmable_origin(move || async move { Some(response.to_vec()) }).await
}

/// Start an origin whose reply is produced by `f`; `None` closes without replying.
pub async fn start_programmable_origin<F, Fut>(f: F) -> (SocketAddr, Seen)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Option<Vec<u8>>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Seen::default();
    let f = Arc::new(f);

    let log = seen.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = Arc::clone(&f);
            let log = log.clone();
            tokio::spawn(async move {
                let request = read_head(&mut socket).await;
                log.0.lock().unwrap().push(String::from_utf8_lossy(&request).into_owned());
                if let Some(reply) = f().await {
                    let _ = socket.write_all(&reply).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, seen)
}

async fn read_head(socket: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    buf
}

/// A proxy running on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub controller: Arc<ProxyController>,
    pub config_updates: mpsc::UnboundedSender<ProxyConfig>,
    pub shutdown: Shutdown,
}

/// Start a proxy that dials origins on `origin_port`.
pub async fn start_proxy(mut config: ProxyConfig, origin_port: u16) -> TestProxy {
    config.proxy.origin_port = origin_port;
    config.timeouts.read_secs = 2;

    let controller =
        Arc::new(ProxyController::from_config(&config, TcpOrigin::from_config(&config)).unwrap());
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, config.listener.max_connections);

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server = ProxyServer::new(Arc::clone(&controller), &config);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    TestProxy {
        addr,
        controller,
        config_updates,
        shutdown,
    }
}

/// Send `raw` to the proxy, half-close, and read the whole reply.
pub async fn send(addr: SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut reply))
        .await
        .expect("proxy reply timed out")
        .unwrap();
    reply
}
