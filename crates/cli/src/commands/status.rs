//! `reframe status` — Show configuration and pending-alert status.

use anyhow::Result;
use reframe_config::AppConfig;
use reframe_core::Store;

pub async fn run() -> Result<()> {
    let config = AppConfig::load()?;

    println!("Reframe Status");
    println!("==============\n");
    println!("  Provider:     {}", config.provider);
    println!("  Model:        {}", config.model);
    println!(
        "  API key:      {}",
        if config.has_api_key() { "configured" } else { "missing" }
    );
    println!("  Store:        {} ({})", config.store.backend, config.store.path);
    println!("  Daily limit:  {} AI calls/user", config.usage.daily_limit);
    println!(
        "  Gateway:      {}:{}",
        config.gateway.host, config.gateway.port
    );

    // Pending safety alerts need eyes on them.
    if config.store.backend == "sqlite" && std::path::Path::new(&config.store.path).exists() {
        let store = reframe_store::SqliteStore::new(&config.store.path).await?;
        let pending = store.pending_alerts().await?;
        println!();
        if pending.is_empty() {
            println!("  No pending safety alerts.");
        } else {
            println!("  {} pending safety alert(s):", pending.len());
            for alert in pending.iter().take(10) {
                println!(
                    "    [{}] session {} — {}",
                    alert.created_at.format("%Y-%m-%d %H:%M"),
                    alert.session_id,
                    alert.risk_level
                );
            }
        }
    }

    Ok(())
}
