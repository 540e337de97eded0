//! relay-gateway — invoice ingestion HTTP server.
//!
//! Accepts multipart document uploads, persists them to the blob store, and
//! publishes one queue event per accepted invoice.
//!
//! Pipeline flow: gateway → queue → worker → partner

use clap::Parser;

use relay_core::config::{load_dotenv, RelayConfig};

// ── CLI ─────────────────────────────────────────────────────────────

/// Invoice ingestion gateway — accepts uploads and queues them for delivery.
#[derive(Parser, Debug)]
#[command(name = "relay-gateway", version, about)]
struct Cli {
    /// Bind host override (falls back to GATEWAY_HOST).
    #[arg(long)]
    host: Option<String>,

    /// Bind port override (falls back to GATEWAY_PORT).
    #[arg(long)]
    port: Option<u16>,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let mut config = RelayConfig::from_env()?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    relay_gateway::startup::run(config).await
}
