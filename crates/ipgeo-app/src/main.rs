use std::sync::Arc;

use anyhow::{Context, Result};
use ipgeo_client::IpGeolocationClient;
use ipgeo_core::Config;
use ipgeo_storage::{MemoryStore, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    ipgeo_core::init()?;

    let (config, _) = Config::load_validated()?;

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create cache directory")?;
    }
    let local = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open cache at {}", db_path.display()))?;

    let client = IpGeolocationClient::with_endpoints(
        config.client_config(),
        config.endpoints,
        Arc::new(MemoryStore::new()),
        Arc::new(local),
    )?;

    tracing::info!(cache = %db_path.display(), "Looking up geolocation");

    let result = client.get_geolocation().await;
    if result.is_error() {
        tracing::warn!("Lookup returned an error result");
    }

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
