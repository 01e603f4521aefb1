//! Rewriting forward proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │                 REWRITE PROXY                 │
//!   Client request    │  ┌──────────┐   ┌─────────┐   ┌────────────┐  │
//!   ──────────────────┼─▶│ listener │──▶│ request │──▶│  rewrite   │  │
//!                     │  └──────────┘   │  parse  │   │ (req line) │  │
//!                     │                 └─────────┘   └─────┬──────┘  │
//!                     │                                     ▼         │
//!                     │                 ┌─────────┐   ┌────────────┐  │
//!                     │                 │  cache  │◀─▶│ controller │  │
//!                     │                 └─────────┘   └─────┬──────┘  │
//!                     │                                     ▼         │
//!   Client response   │  ┌──────────┐   ┌─────────┐   ┌────────────┐  │
//!   ◀─────────────────┼──│ encode   │◀──│ rewrite │◀──│   origin   │◀─┼── Origin
//!                     │  └──────────┘   │ (body)  │   │  :80 fetch │  │   server
//!                     │                 └─────────┘   └────────────┘  │
//!                     └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use rewrite_proxy::config::{load_config, ProxyConfig};
use rewrite_proxy::lifecycle::startup;
use rewrite_proxy::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "rewrite-proxy")]
#[command(about = "Forward HTTP proxy that rewrites traffic and caches responses", long_about = None)]
struct Cli {
    /// TOML configuration file; watched for rule changes while running.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Serve conditional GETs from the response cache.
    #[arg(long)]
    cache: bool,

    /// Send `Connection: close` upstream instead of `keep-alive`.
    #[arg(long)]
    no_keep_alive: bool,
}

impl Cli {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if self.cache {
            config.proxy.use_cache = true;
        }
        if self.no_keep_alive {
            config.proxy.keep_alive = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);

    init_logging(&config.observability);
    tracing::info!("rewrite-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        read_timeout_secs = config.timeouts.read_secs,
        "Configuration loaded"
    );

    startup::run(config, cli.config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
