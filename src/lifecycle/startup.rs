//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the controller from validated configuration
//! - Start background tasks (metrics, config watcher, signal listener)
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener starts last (traffic only when ready)

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::watcher::watch_config;
use crate::config::ProxyConfig;
use crate::lifecycle::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;
use crate::proxy::{ProxyController, ProxyServer, TcpOrigin};
use crate::rewrite::RewriteError;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid rewrite rules: {0}")]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("cannot watch configuration file: {0}")]
    Watch(#[from] notify::Error),
}

/// Run the proxy until a shutdown signal arrives.
///
/// With `config_path` set, edits to that file are applied while running.
pub async fn run(config: ProxyConfig, config_path: Option<PathBuf>) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let controller = Arc::new(ProxyController::from_config(
        &config,
        TcpOrigin::from_config(&config),
    )?);
    tracing::info!(
        keep_alive = controller.keep_alive(),
        use_cache = controller.use_cache(),
        request_rules = config.rewrite.request.len(),
        response_rules = config.rewrite.response.len(),
        origin_port = config.proxy.origin_port,
        "Controller ready"
    );

    // Keep the watcher handle alive for the server's lifetime.
    let (_watcher, config_updates) = match config_path {
        Some(path) => {
            let initial = std::fs::read_to_string(&path).ok();
            let (watch, updates) = watch_config(&path, initial)?;
            (Some(watch), updates)
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    shutdown.trigger_on_signal();

    let listener = Listener::bind(&config.listener).await?;
    let server = ProxyServer::new(controller, &config);
    server.run(listener, config_updates, shutdown_rx).await?;
    Ok(())
}
