//! Relay binary: environment configuration in, HTTP server out.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use diary_gateway::{AppConfig, RelayService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().context("loading configuration from environment")?;
    let service = RelayService::new(config).context("assembling relay service")?;
    service.start().await.context("running relay service")?;
    Ok(())
}
