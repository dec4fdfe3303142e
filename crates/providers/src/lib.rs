//! Generative-AI provider implementations for Reframe.
//!
//! All providers implement the `reframe_core::Provider` trait.
//! `build_from_config` selects the right one at startup.

pub mod extract;
pub mod gemini;
pub mod scripted;
pub mod timeout;

pub use gemini::GeminiProvider;
pub use scripted::ScriptedProvider;
pub use timeout::TimeoutProvider;

use reframe_core::Provider;
use reframe_core::error::ProviderError;
use std::sync::Arc;
use std::time::Duration;

/// Build the configured provider, wrapped with the configured timeout.
///
/// `provider = "scripted"` yields an offline provider that always answers
/// with a fixed string — useful for development without an API key.
pub fn build_from_config(
    config: &reframe_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let inner: Arc<dyn Provider> = match config.provider.as_str() {
        "scripted" => Arc::new(ScriptedProvider::always(
            "You're doing great — keep going!",
        )),
        "gemini" => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ProviderError::NotConfigured(
                    "Gemini provider requires an API key (set REFRAME_API_KEY)".into(),
                )
            })?;
            Arc::new(GeminiProvider::new(api_key, &config.model))
        }
        other => {
            return Err(ProviderError::NotConfigured(format!(
                "Unknown provider '{other}'"
            )));
        }
    };

    Ok(Arc::new(TimeoutProvider::new(
        inner,
        Duration::from_secs(config.ai_timeout_secs),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_provider_needs_no_key() {
        let config = reframe_config::AppConfig {
            provider: "scripted".into(),
            ..Default::default()
        };
        assert!(build_from_config(&config).is_ok());
    }

    #[test]
    fn gemini_without_key_is_not_configured() {
        let config = reframe_config::AppConfig {
            provider: "gemini".into(),
            api_key: None,
            ..Default::default()
        };
        assert!(matches!(
            build_from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn unknown_provider_rejected() {
        let config = reframe_config::AppConfig {
            provider: "gpt-9".into(),
            ..Default::default()
        };
        assert!(build_from_config(&config).is_err());
    }
}
