use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::ports::model_provider::TokenUsage;

/// Best-effort USD cost estimate for a model call.
#[async_trait]
pub trait CostLookup: Send + Sync {
    /// `Ok(None)` when the model is not priced.
    async fn cost_usd(&self, model: &str, usage: &TokenUsage) -> DomainResult<Option<f64>>;
}
