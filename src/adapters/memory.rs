//! In-memory store implementing every repository port.
//!
//! Used by tests and by `cadence run --ephemeral`. Nothing survives the process.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{InboxItem, Task, TaskRun, TriggerKind, TriggerState};
use crate::domain::ports::{
    InboxRepository, ModuleConfigRepository, TaskFilter, TaskRepository, TaskRunRepository,
    TriggerStateRepository,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: RwLock<Vec<Task>>,
    runs: RwLock<Vec<TaskRun>>,
    states: RwLock<HashMap<String, TriggerState>>,
    modules: RwLock<HashMap<String, Value>>,
    inbox: RwLock<Vec<InboxItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every run ever recorded, oldest first.
    pub async fn all_runs(&self) -> Vec<TaskRun> {
        self.runs.read().await.clone()
    }

    /// Every inbox item, oldest first.
    pub async fn all_inbox_items(&self) -> Vec<InboxItem> {
        self.inbox.read().await.clone()
    }
}

fn matches_filter(task: &Task, filter: &TaskFilter) -> bool {
    filter.trigger_type.as_ref().map_or(true, |t| &task.trigger_type == t)
        && filter.active.map_or(true, |a| task.is_active == a)
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn create(&self, task: &Task) -> DomainResult<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.iter().any(|t| t.id == task.id || t.name == task.name) {
            return Err(DomainError::ValidationFailed(format!(
                "task '{}' already exists",
                task.name
            )));
        }
        tasks.push(task.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        Ok(self.tasks.read().await.iter().find(|t| t.id == id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Task>> {
        Ok(self.tasks.read().await.iter().find(|t| t.name == name).cloned())
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        let mut tasks = self.tasks.write().await;
        let slot = tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or(DomainError::TaskNotFound(task.id))?;
        *slot = task.clone();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        self.tasks.write().await.retain(|t| t.id != id);
        self.runs.write().await.retain(|r| r.task_id != id);
        Ok(())
    }

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        Ok(self
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| matches_filter(t, &filter))
            .cloned()
            .collect())
    }

    async fn list_active(&self, trigger_type: Option<&TriggerKind>) -> DomainResult<Vec<Task>> {
        TaskRepository::list(
            self,
            TaskFilter {
                trigger_type: trigger_type.cloned(),
                active: Some(true),
            },
        )
        .await
    }

    async fn record_last_run(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<()> {
        if let Some(task) = self.tasks.write().await.iter_mut().find(|t| t.id == id) {
            task.last_run_at = Some(at);
        }
        Ok(())
    }

    async fn set_next_run(&self, id: Uuid, at: Option<DateTime<Utc>>) -> DomainResult<()> {
        if let Some(task) = self.tasks.write().await.iter_mut().find(|t| t.id == id) {
            task.next_run_at = at;
        }
        Ok(())
    }
}

#[async_trait]
impl TaskRunRepository for MemoryStore {
    async fn create(&self, run: &TaskRun) -> DomainResult<()> {
        self.runs.write().await.push(run.clone());
        Ok(())
    }

    async fn update(&self, run: &TaskRun) -> DomainResult<()> {
        let mut runs = self.runs.write().await;
        let slot = runs
            .iter_mut()
            .find(|r| r.id == run.id)
            .ok_or(DomainError::TaskRunNotFound(run.id))?;
        *slot = run.clone();
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<TaskRun>> {
        Ok(self.runs.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn list_for_task(&self, task_id: Uuid, limit: usize) -> DomainResult<Vec<TaskRun>> {
        Ok(self
            .runs
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| r.task_id == task_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TriggerStateRepository for MemoryStore {
    async fn get(&self, trigger_id: &str) -> DomainResult<Option<TriggerState>> {
        Ok(self.states.read().await.get(trigger_id).cloned())
    }

    async fn put(&self, state: &TriggerState) -> DomainResult<()> {
        self.states
            .write()
            .await
            .insert(state.trigger_id.clone(), state.clone());
        Ok(())
    }
}

#[async_trait]
impl ModuleConfigRepository for MemoryStore {
    async fn get(&self, module_id: &str) -> DomainResult<Option<Value>> {
        Ok(self.modules.read().await.get(module_id).cloned())
    }

    async fn put(&self, module_id: &str, config: &Value) -> DomainResult<()> {
        self.modules
            .write()
            .await
            .insert(module_id.to_string(), config.clone());
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<(String, Value)>> {
        let mut all: Vec<_> = self
            .modules
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(all)
    }
}

#[async_trait]
impl InboxRepository for MemoryStore {
    async fn create(&self, item: &InboxItem) -> DomainResult<()> {
        self.inbox.write().await.push(item.clone());
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<InboxItem>> {
        Ok(self.inbox.read().await.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_list_active_filters_kind_and_flag() {
        let store = MemoryStore::new();
        let kind = TriggerKind::Registered("mail:inbox".into());
        let on = Task::new("on", "p", kind.clone());
        let off = Task::new("off", "p", kind.clone()).inactive();
        let other = Task::new("other", "p", TriggerKind::Manual);
        for t in [&on, &off, &other] {
            TaskRepository::create(&store, t).await.unwrap();
        }

        let active = store.list_active(Some(&kind)).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, on.id);
        assert_eq!(store.list_active(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let store = MemoryStore::new();
        TaskRepository::create(&store, &Task::new("a", "p", TriggerKind::Manual)).await.unwrap();
        let duplicate = Task::new("a", "p", TriggerKind::Manual);
        assert!(TaskRepository::create(&store, &duplicate).await.is_err());
    }

    #[tokio::test]
    async fn test_trigger_state_overwrite() {
        let store = MemoryStore::new();
        for n in 0..3 {
            TriggerStateRepository::put(
                &store,
                &TriggerState {
                    trigger_id: "x:y".into(),
                    state: json!({ "cursor": n }),
                    last_poll_at: Some(Utc::now()),
                },
            )
            .await
            .unwrap();
        }
        let state = TriggerStateRepository::get(&store, "x:y").await.unwrap().unwrap();
        assert_eq!(state.state, json!({ "cursor": 2 }));
    }
}
