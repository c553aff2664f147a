//! Listing store server binary

use anyhow::Result;
use listing_store::{Config, ListingStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting OpenMic Board listing store");

    // Load configuration
    let config = Config::from_env()?;

    // Open store
    let store = ListingStore::open(config).await?;
    tracing::info!(
        service = %store.config().service_name,
        version = %store.config().service_version,
        data_dir = ?store.config().data_dir,
        "Listing store opened successfully"
    );

    // The HTTP layer attaches here; for now, just keep running
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down listing store");
    store.shutdown().await?;
    Ok(())
}
