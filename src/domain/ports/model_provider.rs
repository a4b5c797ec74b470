//! Language-model provider port.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ports::toolset::ToolSet;

/// Failure reported by a model provider. Displays as the provider's message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{0}")]
    Failed(String),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    Transport(String),
}

#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub system: String,
    pub user: String,
    pub tools: ToolSet,
    /// Bound on reasoning/tool steps; `None` when no tools are offered.
    pub max_steps: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
    pub model: String,
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, ProviderError>;
}

/// Resolves the currently active provider, if any.
#[async_trait]
pub trait ModelResolver: Send + Sync {
    async fn resolve(&self) -> Option<Arc<dyn ModelProvider>>;
}
