pub mod client_config;
pub mod config;
pub mod error;

pub use client_config::{ClientConfig, DEFAULT_TTL_MS};
pub use config::{
    Config, EndpointConfig, StorageConfig, ValidationResult, DEFAULT_GEOLOCATION_URL,
    DEFAULT_WARM_UP_URL,
};
pub use error::{NetworkError, StorageError};

use anyhow::Result;

/// Initialize logging for binaries embedding the client
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("IP geolocation core initialized");
    Ok(())
}
