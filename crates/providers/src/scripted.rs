//! Scripted provider — a deterministic fake for tests and offline use.
//!
//! Replays a queue of canned responses, then falls back to a fixed
//! default. Errors can be enqueued to exercise failure paths.

use async_trait::async_trait;
use reframe_core::error::ProviderError;
use reframe_core::provider::{GenerationRequest, GenerationResponse};
use std::collections::VecDeque;
use std::sync::Mutex;

type ScriptedReply = Result<String, ProviderError>;

pub struct ScriptedProvider {
    name: String,
    queue: Mutex<VecDeque<ScriptedReply>>,
    default_text: String,
    /// Prompts seen, for assertions in tests.
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    /// A provider that always returns `text`.
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            name: "scripted".into(),
            queue: Mutex::new(VecDeque::new()),
            default_text: text.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue one reply to return before the default kicks in.
    pub fn push_reply(&self, text: impl Into<String>) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(text.into()));
    }

    /// Queue one error to return before the default kicks in.
    pub fn push_error(&self, error: ProviderError) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
    }

    /// Every prompt this provider has been asked to answer.
    pub fn seen_prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl reframe_core::Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.prompt);

        let next = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match next {
            Some(Ok(text)) => Ok(GenerationResponse {
                text,
                model: "scripted".into(),
            }),
            Some(Err(e)) => Err(e),
            None => Ok(GenerationResponse {
                text: self.default_text.clone(),
                model: "scripted".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reframe_core::Provider;

    #[tokio::test]
    async fn replays_queue_then_default() {
        let provider = ScriptedProvider::always("default");
        provider.push_reply("first");
        provider.push_error(ProviderError::Timeout("scripted".into()));

        let r1 = provider.generate(GenerationRequest::new("a")).await.unwrap();
        assert_eq!(r1.text, "first");

        let r2 = provider.generate(GenerationRequest::new("b")).await;
        assert!(matches!(r2, Err(ProviderError::Timeout(_))));

        let r3 = provider.generate(GenerationRequest::new("c")).await.unwrap();
        assert_eq!(r3.text, "default");

        assert_eq!(provider.seen_prompts(), vec!["a", "b", "c"]);
    }
}
