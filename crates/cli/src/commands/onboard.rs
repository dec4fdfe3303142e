//! `reframe onboard` — First-time setup.

use anyhow::Result;
use reframe_config::AppConfig;

pub async fn run() -> Result<()> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Reframe — First-Time Setup");
    println!("==========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete and re-run onboard.\n");
    } else {
        let default_toml = AppConfig::default_toml();
        std::fs::write(&config_path, &default_toml)?;
        println!("  Created config.toml at: {}", config_path.display());
        println!("\n  Next steps:");
        println!("  1. Edit {} and add your API key", config_path.display());
        println!("     (or set REFRAME_API_KEY in the environment)");
        println!("  2. Set gateway.token_secret for stable tokens");
        println!("  3. Run: reframe serve\n");
    }

    Ok(())
}
