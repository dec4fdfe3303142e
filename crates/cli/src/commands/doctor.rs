//! `reframe doctor` — Diagnose system health.

use anyhow::Result;
use reframe_config::AppConfig;
use reframe_core::Provider;

pub async fn run() -> Result<()> {
    println!("Reframe Doctor — System Diagnostics");
    println!("===================================\n");

    let mut issues = 0;

    // Check config
    let config_path = AppConfig::config_dir().join("config.toml");
    let config = if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  ok    Config file valid");
                Some(config)
            }
            Err(e) => {
                println!("  FAIL  Config file invalid: {e}");
                issues += 1;
                None
            }
        }
    } else {
        println!("  warn  No config file — run `reframe onboard` (using defaults)");
        AppConfig::load().ok()
    };

    if let Some(config) = config {
        if config.has_api_key() || config.provider == "scripted" {
            println!("  ok    Provider credentials available");
        } else {
            println!("  FAIL  No API key — set REFRAME_API_KEY or api_key in config.toml");
            issues += 1;
        }

        if config.gateway.token_secret.is_some() {
            println!("  ok    Token secret configured");
        } else {
            println!("  warn  No gateway.token_secret — tokens will not survive restarts");
        }

        match reframe_providers::build_from_config(&config) {
            Ok(provider) => match provider.health_check().await {
                Ok(true) => println!("  ok    Provider reachable"),
                Ok(false) => {
                    println!("  FAIL  Provider health check failed");
                    issues += 1;
                }
                Err(e) => {
                    println!("  FAIL  Provider health check errored: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  FAIL  Provider construction failed: {e}");
                issues += 1;
            }
        }

        if config.store.backend == "sqlite" {
            match reframe_store::SqliteStore::new(&config.store.path).await {
                Ok(_) => println!("  ok    Store opens at {}", config.store.path),
                Err(e) => {
                    println!("  FAIL  Store failed to open: {e}");
                    issues += 1;
                }
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
