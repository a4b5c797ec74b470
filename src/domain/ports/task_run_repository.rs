//! Repository port for task run history.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::TaskRun;

#[async_trait]
pub trait TaskRunRepository: Send + Sync {
    async fn create(&self, run: &TaskRun) -> DomainResult<()>;

    /// Persist status, completion time, result, error and usage.
    async fn update(&self, run: &TaskRun) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<TaskRun>>;

    /// Most recent first.
    async fn list_for_task(&self, task_id: Uuid, limit: usize) -> DomainResult<Vec<TaskRun>>;
}
