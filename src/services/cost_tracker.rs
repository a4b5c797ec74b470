//! Per-model pricing used for best-effort run cost estimates.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::ports::{CostLookup, TokenUsage};

/// Pricing per million tokens for a specific model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    /// Cost per million input tokens (USD).
    pub input: f64,
    /// Cost per million output tokens (USD).
    pub output: f64,
}

/// Known model pricing (USD per million tokens). Earlier entries win.
const PRICING_TABLE: &[(&str, ModelPricing)] = &[
    ("claude-opus-4", ModelPricing { input: 15.0, output: 75.0 }),
    ("opus", ModelPricing { input: 15.0, output: 75.0 }),
    ("claude-sonnet-4", ModelPricing { input: 3.0, output: 15.0 }),
    ("sonnet", ModelPricing { input: 3.0, output: 15.0 }),
    ("claude-haiku-4", ModelPricing { input: 0.80, output: 4.0 }),
    ("haiku", ModelPricing { input: 0.80, output: 4.0 }),
];

/// Get pricing for a model by name or alias.
///
/// Matches against known model name substrings (e.g. "sonnet" matches
/// "claude-sonnet-4-5-20250929").
pub fn get_model_pricing(model: &str) -> Option<ModelPricing> {
    let model_lower = model.to_lowercase();
    PRICING_TABLE
        .iter()
        .find(|(name, _)| model_lower.contains(name))
        .map(|(_, pricing)| *pricing)
}

/// Estimate cost in USD for a given set of token counts.
#[allow(clippy::cast_precision_loss)]
pub fn estimate_cost(model: &str, usage: &TokenUsage) -> Option<f64> {
    let pricing = get_model_pricing(model)?;
    Some(
        (usage.input_tokens as f64 * pricing.input + usage.output_tokens as f64 * pricing.output)
            / 1_000_000.0,
    )
}

/// The built-in pricing table exposed as a [`CostLookup`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingTable;

#[async_trait]
impl CostLookup for PricingTable {
    async fn cost_usd(&self, model: &str, usage: &TokenUsage) -> DomainResult<Option<f64>> {
        Ok(estimate_cost(model, usage))
    }
}
