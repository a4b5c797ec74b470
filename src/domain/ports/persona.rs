use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Supplies the agent's persona/instruction text for system prompts.
#[async_trait]
pub trait PersonaSource: Send + Sync {
    async fn system_prompt(&self) -> DomainResult<String>;
}
