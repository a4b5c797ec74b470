//! Ports for poller state and trigger-module configuration.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::DomainResult;
use crate::domain::models::TriggerState;

#[async_trait]
pub trait TriggerStateRepository: Send + Sync {
    async fn get(&self, trigger_id: &str) -> DomainResult<Option<TriggerState>>;

    /// Atomically replace the state row for `state.trigger_id`.
    async fn put(&self, state: &TriggerState) -> DomainResult<()>;
}

/// Stored configuration (URLs, credentials, intervals) per trigger module.
#[async_trait]
pub trait ModuleConfigRepository: Send + Sync {
    async fn get(&self, module_id: &str) -> DomainResult<Option<Value>>;

    async fn put(&self, module_id: &str, config: &Value) -> DomainResult<()>;

    async fn list(&self) -> DomainResult<Vec<(String, Value)>>;
}
