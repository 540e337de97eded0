//! Gateway startup: shared state construction and HTTP serving.

use std::sync::Arc;

use tracing::info;

use relay_core::RelayConfig;
use relay_queue::SqsQueue;
use relay_storage::{BlobStore, StatusStore};

use crate::router::build_router;
use crate::state::AppState;

/// Build shared state from config and serve until shutdown.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    config.log_summary();

    let blobs = Arc::new(BlobStore::from_config(&config)?);
    // Fail fast if the container is unusable before accepting traffic.
    blobs.ensure_container().await?;

    let publisher = Arc::new(SqsQueue::new(&config.aws, &config.queue).await?);

    let state = Arc::new(AppState {
        status: StatusStore::new(blobs.clone()),
        blobs,
        publisher,
        max_upload_bytes: (config.storage.max_upload_mb as usize) * 1024 * 1024,
    });

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
