//! `reframe serve` — Start the HTTP gateway.

use anyhow::Result;
use reframe_config::AppConfig;

pub async fn run(port: Option<u16>) -> Result<()> {
    let mut config = AppConfig::load()?;
    if let Some(port) = port {
        config.gateway.port = port;
    }

    tracing::info!(
        provider = %config.provider,
        store = %config.store.backend,
        daily_limit = config.usage.daily_limit,
        "Starting gateway"
    );

    reframe_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!("Gateway failed: {e}"))
}
