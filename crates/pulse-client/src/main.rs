//! # Pulse Stream
//!
//! Terminal client for a Pulse endpoint. Picks the best available transport,
//! falls back when it does not work, and reconnects when the connection drops.
//!
//! ## Usage
//!
//! ```bash
//! # Connect with default settings
//! pulse-stream ws://127.0.0.1:8080/ws
//!
//! # Run with custom config
//! pulse-stream --config /path/to/pulse-stream.toml
//!
//! # Run with environment variables
//! PULSE_URL=ws://127.0.0.1:8080/ws PULSE_STREAM__TRANSPORT__WEBSOCKET=false pulse-stream
//! ```

mod config;
mod console;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Terminal client for a Pulse endpoint
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Endpoint URL, overrides the configured one
    url: Option<String>,
}

fn start_metrics_exporter(port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install metrics exporter")?;

    tenvis_pulse_core::metrics::describe_metrics();
    info!("Metrics server listening on {}", addr);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pulse_stream=info,tenvis_pulse_core=info,tenvis_pulse_transport=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    // Load configuration
    let mut config = config::Config::load(args.config.as_deref())?;
    if let Some(url) = args.url {
        config.url = url;
    }

    if config.metrics.enabled {
        start_metrics_exporter(config.metrics.port)?;
    }

    console::run(config).await
}
