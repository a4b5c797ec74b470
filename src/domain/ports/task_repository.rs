//! Repository port for task persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Task, TriggerKind};

/// Filter for listing tasks.
#[derive(Debug, Default)]
pub struct TaskFilter {
    pub trigger_type: Option<TriggerKind>,
    pub active: Option<bool>,
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Task>>;

    /// Overwrite every mutable field of an existing task.
    async fn update(&self, task: &Task) -> DomainResult<()>;

    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>>;

    /// Active tasks, optionally restricted to one trigger kind.
    async fn list_active(&self, trigger_type: Option<&TriggerKind>) -> DomainResult<Vec<Task>>;

    async fn record_last_run(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<()>;

    async fn set_next_run(&self, id: Uuid, at: Option<DateTime<Utc>>) -> DomainResult<()>;
}
