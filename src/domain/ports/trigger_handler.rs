//! Trigger plugin contract.
//!
//! A trigger module contributes one or more triggers. Each trigger exposes
//! whichever of poll, subscribe and filter it supports; the others keep the
//! default implementations below.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PollOutcome, TriggerEvent, TriggerSpec};

/// Callback a subscription uses to deliver events. May be called from any task.
pub type EventSink = Arc<dyn Fn(TriggerEvent) + Send + Sync>;

/// Tears down a live subscription.
pub type Unsubscribe = Box<dyn FnOnce() -> DomainResult<()> + Send>;

#[async_trait]
pub trait TriggerHandler: Send + Sync {
    /// `config` is the owning module's stored configuration, `state` the
    /// blob returned by the previous poll (`Null` on the first one).
    async fn poll(&self, _config: &Value, _state: &Value) -> DomainResult<PollOutcome> {
        Err(DomainError::Unsupported("poll"))
    }

    async fn subscribe(&self, _config: &Value, _sink: EventSink) -> DomainResult<Unsubscribe> {
        Err(DomainError::Unsupported("subscribe"))
    }

    /// Whether `event` concerns a task with this trigger configuration.
    fn filter(&self, _event: &TriggerEvent, _task_config: &Value) -> bool {
        true
    }
}

/// One trigger offered by a module.
pub struct ModuleTrigger {
    pub local_id: String,
    pub spec: TriggerSpec,
    pub handler: Arc<dyn TriggerHandler>,
}

impl ModuleTrigger {
    pub fn new(
        local_id: impl Into<String>,
        spec: TriggerSpec,
        handler: Arc<dyn TriggerHandler>,
    ) -> Self {
        Self {
            local_id: local_id.into(),
            spec,
            handler,
        }
    }
}

/// A discoverable unit of triggers, loaded into the registry at startup.
pub trait TriggerModule: Send + Sync {
    fn id(&self) -> &str;

    fn triggers(&self) -> Vec<ModuleTrigger>;
}
