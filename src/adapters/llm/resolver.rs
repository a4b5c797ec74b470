//! Maps the `llm` configuration section to a provider.

use std::sync::Arc;

use async_trait::async_trait;

use crate::adapters::llm::anthropic::{AnthropicConfig, AnthropicProvider};
use crate::adapters::llm::mock::MockProvider;
use crate::domain::models::LlmConfig;
use crate::domain::ports::{ModelProvider, ModelResolver, ProviderError};

pub const KNOWN_PROVIDERS: [&str; 2] = ["anthropic", "mock"];

/// Resolves to the provider chosen at construction, if any.
#[derive(Clone, Default)]
pub struct ConfiguredModelResolver {
    provider: Option<Arc<dyn ModelProvider>>,
}

impl ConfiguredModelResolver {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let provider: Option<Arc<dyn ModelProvider>> = match config.provider.as_deref() {
            None => None,
            Some("anthropic") => match AnthropicConfig::from_llm_config(config) {
                Some(anthropic) => Some(Arc::new(AnthropicProvider::new(anthropic)?)),
                None => {
                    tracing::warn!("anthropic provider selected but no API key is set");
                    None
                }
            },
            Some("mock") => Some(Arc::new(MockProvider::default())),
            Some(other) => {
                return Err(ProviderError::Failed(format!("unknown model provider '{other}'")));
            }
        };
        Ok(Self { provider })
    }

    pub fn fixed(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// A resolver with no provider configured.
    pub fn none() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelResolver for ConfiguredModelResolver {
    async fn resolve(&self) -> Option<Arc<dyn ModelProvider>> {
        self.provider.clone()
    }
}
