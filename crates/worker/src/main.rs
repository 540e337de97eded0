//! relay-worker — invoice delivery worker.
//!
//! Polls the invoice queue, downloads each accepted document, resolves the
//! partner credential, and POSTs the document to the partner endpoint.
//!
//! Pipeline flow: gateway → queue → worker → partner

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use relay_core::config::{load_dotenv, RelayConfig};
use relay_queue::SqsQueue;
use relay_secrets::SecretResolver;
use relay_storage::{BlobStore, StatusStore};
use relay_worker::{runner, InvoiceProcessor, PartnerClient};

// ── CLI ─────────────────────────────────────────────────────────────

/// Invoice delivery worker — drains the queue and forwards documents.
#[derive(Parser, Debug)]
#[command(name = "relay-worker", version, about)]
struct Cli {
    /// Messages to request per queue poll (SQS allows at most 10).
    #[arg(long, env = "WORKER_POLL_BATCH", default_value_t = 10)]
    poll_batch: u32,
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
    let config = RelayConfig::from_env()?;
    config.log_summary();

    let blobs = Arc::new(BlobStore::from_config(&config)?);
    let status = StatusStore::new(blobs.clone());
    let consumer = Arc::new(SqsQueue::new(&config.aws, &config.queue).await?);
    let secrets = SecretResolver::from_config(&config).await?;
    let partner = PartnerClient::from_config(&config.partner)?;

    let processor = InvoiceProcessor::new(
        blobs,
        status,
        secrets,
        partner,
        config.partner.token_secret_name.clone(),
    );

    info!("relay-worker starting");
    tokio::select! {
        result = runner::run(consumer, processor, cli.poll_batch) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }
    info!("relay-worker exited cleanly");
    Ok(())
}
