//! Parameter-addressed HTTP forwarding proxy.
//!
//! Every request names its destination in a query parameter (`targetUrl` by
//! default). The proxy issues the same GET or POST to that destination and
//! streams the answer back.
//!
//! ```text
//!   Client ──GET /?targetUrl=http%3A%2F%2Fbackend%2Fx──▶ ┌──────────────┐ ──GET /x──▶ Backend
//!                                                        │ param-proxy  │
//!   Client ◀──────── status, content-type, body ──────── └──────────────┘ ◀────────── Backend
//! ```

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use param_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use param_proxy::lifecycle::{signals, Shutdown};
use param_proxy::observability::{logging, metrics};
use param_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "param-proxy")]
#[command(about = "Forward HTTP requests to the URL given in a request parameter", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(long)]
    bind: Option<String>,

    /// Override forwarder.parameter_key.
    #[arg(long)]
    parameter_key: Option<String>,
}

fn resolve_config(cli: &Cli) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(key) = &cli.parameter_key {
        config.forwarder.parameter_key = key.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init_logging(&config.observability)?;
    tracing::info!("param-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        parameter_key = %config.forwarder.parameter_key,
        buffer_size = config.forwarder.buffer_size,
        upstream_timeout_secs = config.timeouts.upstream_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(&shutdown);

    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
