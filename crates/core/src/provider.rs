//! Provider trait — the abstraction over the generative-AI collaborator.
//!
//! A Provider knows how to turn a single instruction prompt into generated
//! text. It is treated as fallible and slow: every caller bounds the call
//! with a timeout and supplies a fallback payload. The model is never
//! trusted to return well-formed structured output — parsing happens in
//! the response normalizer, not here.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Harm categories the provider is asked to block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmCategory {
    Harassment,
    HateSpeech,
    SexuallyExplicit,
    DangerousContent,
}

impl HarmCategory {
    pub const ALL: [HarmCategory; 4] = [
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
        HarmCategory::DangerousContent,
    ];
}

/// Blocking threshold per harm category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockThreshold {
    /// The strictest setting — the default for a children's product.
    #[default]
    BlockLowAndAbove,
    BlockMediumAndAbove,
    BlockOnlyHigh,
    BlockNone,
}

/// A single text-generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The full instruction prompt.
    pub prompt: String,

    /// Temperature (0.0 = deterministic, 1.0 = creative).
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Safety thresholds, one per harm category.
    #[serde(default = "default_safety")]
    pub safety: Vec<(HarmCategory, BlockThreshold)>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    1024
}

fn default_safety() -> Vec<(HarmCategory, BlockThreshold)> {
    HarmCategory::ALL
        .iter()
        .map(|c| (*c, BlockThreshold::BlockLowAndAbove))
        .collect()
}

impl GenerationRequest {
    /// A request with the default temperature and safety settings.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            safety: default_safety(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = max;
        self
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// The generated text, verbatim.
    pub text: String,

    /// Which model actually responded.
    pub model: String,
}

/// The core Provider trait.
///
/// Implementations: Gemini (production), scripted (tests and offline
/// development), timeout wrapper (composition).
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini", "scripted").
    fn name(&self) -> &str;

    /// Generate text for a single prompt.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError>;

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults() {
        let req = GenerationRequest::new("hello");
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(req.max_output_tokens, 1024);
        assert_eq!(req.safety.len(), 4);
        assert!(req
            .safety
            .iter()
            .all(|(_, t)| *t == BlockThreshold::BlockLowAndAbove));
    }

    #[test]
    fn builder_overrides() {
        let req = GenerationRequest::new("classify")
            .with_temperature(0.3)
            .with_max_output_tokens(256);
        assert!((req.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(req.max_output_tokens, 256);
    }
}
