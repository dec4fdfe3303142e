//! Timeout wrapper — bounds every generation call.
//!
//! The AI call is the dominant latency source in the system; callers rely
//! on it resolving within a known upper bound so fallback payloads can
//! take over. A timed-out call is a failure, not something to retry.

use async_trait::async_trait;
use reframe_core::Provider;
use reframe_core::error::ProviderError;
use reframe_core::provider::{GenerationRequest, GenerationResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct TimeoutProvider {
    inner: Arc<dyn Provider>,
    timeout: Duration,
}

impl TimeoutProvider {
    pub fn new(inner: Arc<dyn Provider>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl Provider for TimeoutProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError> {
        match tokio::time::timeout(self.timeout, self.inner.generate(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    provider = self.inner.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Generation timed out"
                );
                Err(ProviderError::Timeout(format!(
                    "Provider '{}' timed out after {}s",
                    self.inner.name(),
                    self.timeout.as_secs()
                )))
            }
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowProvider;

    #[async_trait]
    impl Provider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> std::result::Result<GenerationResponse, ProviderError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(GenerationResponse {
                text: "too late".into(),
                model: "slow".into(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_becomes_timeout_error() {
        let provider = TimeoutProvider::new(Arc::new(SlowProvider), Duration::from_secs(5));
        let result = provider.generate(GenerationRequest::new("hi")).await;
        assert!(matches!(result, Err(ProviderError::Timeout(_))));
    }
}
