//! Gemini provider implementation.
//!
//! Uses the Google Generative Language API (`generateContent`).
//!
//! Features:
//! - API key via query parameter
//! - Per-category safety thresholds mapped to the API's enum names
//! - Block-reason detection surfaced as `ProviderError::Blocked`

use async_trait::async_trait;
use reframe_core::error::ProviderError;
use reframe_core::provider::{
    BlockThreshold, GenerationRequest, GenerationResponse, HarmCategory,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider for the given model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn harm_category_name(category: HarmCategory) -> &'static str {
        match category {
            HarmCategory::Harassment => "HARM_CATEGORY_HARASSMENT",
            HarmCategory::HateSpeech => "HARM_CATEGORY_HATE_SPEECH",
            HarmCategory::SexuallyExplicit => "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            HarmCategory::DangerousContent => "HARM_CATEGORY_DANGEROUS_CONTENT",
        }
    }

    fn threshold_name(threshold: BlockThreshold) -> &'static str {
        match threshold {
            BlockThreshold::BlockLowAndAbove => "BLOCK_LOW_AND_ABOVE",
            BlockThreshold::BlockMediumAndAbove => "BLOCK_MEDIUM_AND_ABOVE",
            BlockThreshold::BlockOnlyHigh => "BLOCK_ONLY_HIGH",
            BlockThreshold::BlockNone => "BLOCK_NONE",
        }
    }

    fn to_api_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let safety_settings: Vec<serde_json::Value> = request
            .safety
            .iter()
            .map(|(category, threshold)| {
                serde_json::json!({
                    "category": Self::harm_category_name(*category),
                    "threshold": Self::threshold_name(*threshold),
                })
            })
            .collect();

        serde_json::json!({
            "contents": [{
                "parts": [{ "text": request.prompt }]
            }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_output_tokens,
                "topK": 40,
                "topP": 0.95,
            },
            "safetySettings": safety_settings,
        })
    }
}

#[async_trait]
impl reframe_core::Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let body = self.to_api_body(&request);

        debug!(provider = "gemini", model = %self.model, "Sending generation request");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited { retry_after_secs: 5 });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid Gemini API key".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini API error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: GenerateContentResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse Gemini response: {e}"),
            })?;

        if let Some(feedback) = &api_resp.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(ProviderError::Blocked(reason.clone()));
            }
        }

        let candidate = api_resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Blocked("No candidates returned".into()))?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(ProviderError::Blocked("Candidate blocked for safety".into()));
        }

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(GenerationResponse {
            text,
            model: self.model.clone(),
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        // A missing key fails fast without a network round trip.
        Ok(!self.api_key.is_empty())
    }
}

// ── API response types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,

    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,

    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_body_includes_safety_settings() {
        let provider = GeminiProvider::new("key", "gemini-pro");
        let body = provider.to_api_body(&GenerationRequest::new("hello"));
        let settings = body["safetySettings"].as_array().unwrap();
        assert_eq!(settings.len(), 4);
        assert!(settings
            .iter()
            .all(|s| s["threshold"] == "BLOCK_LOW_AND_ABOVE"));
    }

    #[test]
    fn api_body_carries_generation_config() {
        let provider = GeminiProvider::new("key", "gemini-pro");
        let request = GenerationRequest::new("classify")
            .with_temperature(0.3)
            .with_max_output_tokens(256);
        let body = provider.to_api_body(&request);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
        assert!(
            (body["generationConfig"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6
        );
    }

    #[test]
    fn response_parsing_joins_parts() {
        let json = r#"{
            "candidates": [{
                "content": { "parts": [{ "text": "Hello " }, { "text": "world" }] },
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let text: String = resp.candidates[0]
            .content
            .as_ref()
            .unwrap()
            .parts
            .iter()
            .filter_map(|p| p.text.clone())
            .collect();
        assert_eq!(text, "Hello world");
    }

    #[test]
    fn blocked_prompt_detected() {
        let json = r#"{ "candidates": [], "promptFeedback": { "blockReason": "SAFETY" } }"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            resp.prompt_feedback.unwrap().block_reason.as_deref(),
            Some("SAFETY")
        );
    }
}
