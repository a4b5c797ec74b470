//! Scripted model provider for tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ports::{GenerateRequest, Generation, ModelProvider, ProviderError, TokenUsage};

pub const MOCK_MODEL: &str = "mock-model";

/// Replies with queued results in order, then with a fixed default text.
/// Every request is recorded.
pub struct MockProvider {
    replies: Mutex<VecDeque<Result<Generation, ProviderError>>>,
    default_text: String,
    delay: Option<Duration>,
    calls: Mutex<Vec<GenerateRequest>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("ok")
    }
}

impl MockProvider {
    pub fn new(default_text: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_text: default_text.into(),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(generation(text.into())));
        self
    }

    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Err(ProviderError::Failed(message.into())));
        self
    }

    /// Sleep this long inside every `generate`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<GenerateRequest> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn push(&self, reply: Result<Generation, ProviderError>) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }
}

fn generation(text: String) -> Generation {
    Generation {
        text,
        usage: TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        },
        model: MOCK_MODEL.to_string(),
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        scripted.unwrap_or_else(|| Ok(generation(self.default_text.clone())))
    }
}
