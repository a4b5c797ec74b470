//! Validated task writes.
//!
//! Every create/update/delete/enable/disable passes through here. When an
//! engine is attached it is told about the change so timers, pollers and
//! subscriptions follow the store.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Task, TaskRun, TriggerKind};
use crate::domain::ports::{TaskFilter, TaskRepository, TaskRunRepository};
use crate::services::engine::Engine;
use crate::services::task_scheduler::parse_cron;
use crate::services::trigger_registry::TriggerRegistry;

pub struct TaskService {
    tasks: Arc<dyn TaskRepository>,
    runs: Arc<dyn TaskRunRepository>,
    registry: Arc<TriggerRegistry>,
    engine: Option<Arc<Engine>>,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        runs: Arc<dyn TaskRunRepository>,
        registry: Arc<TriggerRegistry>,
    ) -> Self {
        Self {
            tasks,
            runs,
            registry,
            engine: None,
        }
    }

    /// Notify `engine` of every successful write.
    pub fn with_engine(mut self, engine: Arc<Engine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Check a task before it is written.
    pub fn validate(&self, task: &Task) -> DomainResult<()> {
        if task.name.trim().is_empty() {
            return Err(DomainError::ValidationFailed("task name cannot be empty".to_string()));
        }
        if task.action_prompt.trim().is_empty() {
            return Err(DomainError::ValidationFailed("action prompt cannot be empty".to_string()));
        }

        task.parsed_trigger_config()?;

        match &task.trigger_type {
            TriggerKind::Cron => {
                let expr = task.cron_expression()?;
                parse_cron(&expr).map_err(DomainError::ValidationFailed)?;
            }
            TriggerKind::Interval => {
                task.interval()?;
            }
            TriggerKind::Registered(id) => {
                if !self.registry.is_registered_trigger(id) {
                    return Err(DomainError::UnknownTrigger(id.clone()));
                }
            }
            TriggerKind::Webhook | TriggerKind::Manual => {}
        }

        if let Some(tools) = &task.tools_filter {
            if tools.iter().any(|t| t.trim().is_empty()) {
                return Err(DomainError::ValidationFailed("tool ids cannot be empty".to_string()));
            }
        }
        Ok(())
    }

    pub async fn create_task(&self, task: Task) -> DomainResult<Task> {
        self.validate(&task)?;
        if self.tasks.get_by_name(&task.name).await?.is_some() {
            return Err(DomainError::ValidationFailed(format!(
                "a task named '{}' already exists",
                task.name
            )));
        }
        self.tasks.create(&task).await?;
        tracing::info!(
            task_id = %task.id,
            task = %task.name,
            trigger = %task.trigger_type,
            "task created"
        );
        self.saved(&task).await;
        Ok(task)
    }

    pub async fn update_task(&self, task: Task) -> DomainResult<Task> {
        self.validate(&task)?;
        if let Some(existing) = self.tasks.get_by_name(&task.name).await? {
            if existing.id != task.id {
                return Err(DomainError::ValidationFailed(format!(
                    "a task named '{}' already exists",
                    task.name
                )));
            }
        }
        self.tasks.update(&task).await?;
        self.saved(&task).await;
        Ok(task)
    }

    pub async fn get_task(&self, id: Uuid) -> DomainResult<Task> {
        self.tasks.get(id).await?.ok_or(DomainError::TaskNotFound(id))
    }

    /// Look a task up by id, falling back to its name.
    pub async fn find_task(&self, id_or_name: &str) -> DomainResult<Option<Task>> {
        if let Ok(id) = Uuid::parse_str(id_or_name) {
            if let Some(task) = self.tasks.get(id).await? {
                return Ok(Some(task));
            }
        }
        self.tasks.get_by_name(id_or_name).await
    }

    pub async fn list_tasks(&self, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        self.tasks.list(filter).await
    }

    pub async fn set_active(&self, id: Uuid, active: bool) -> DomainResult<Task> {
        let mut task = self.get_task(id).await?;
        if task.is_active == active {
            return Ok(task);
        }
        task.is_active = active;
        self.tasks.update(&task).await?;
        tracing::info!(task_id = %id, active, "task activation changed");
        self.saved(&task).await;
        Ok(task)
    }

    pub async fn delete_task(&self, id: Uuid) -> DomainResult<()> {
        self.get_task(id).await?;
        self.tasks.delete(id).await?;
        tracing::info!(task_id = %id, "task deleted");
        if let Some(engine) = &self.engine {
            engine.task_deleted(id).await;
        }
        Ok(())
    }

    pub async fn recent_runs(&self, task_id: Uuid, limit: usize) -> DomainResult<Vec<TaskRun>> {
        self.runs.list_for_task(task_id, limit).await
    }

    async fn saved(&self, task: &Task) {
        if let Some(engine) = &self.engine {
            engine.task_saved(task).await;
        }
    }
}
