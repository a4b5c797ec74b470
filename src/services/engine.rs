//! Engine facade.
//!
//! Owns the executor and the three dispatchers and exposes the operations the
//! owning layer (CLI, task service) calls when tasks change.

use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Config, Task, TaskRun, TriggerContext};
use crate::domain::ports::{
    CostLookup, InboxRepository, ModelResolver, ModuleConfigRepository, Notifier, PersonaSource,
    TaskRepository, TaskRunRepository, ToolSetBuilder, TriggerStateRepository,
};
use crate::services::task_executor::{ExecutorPorts, TaskExecutor};
use crate::services::task_scheduler::{SyncReport, TaskScheduler};
use crate::services::trigger_poller::{DispatchPorts, TriggerPoller};
use crate::services::trigger_registry::TriggerRegistry;
use crate::services::trigger_subscriber::TriggerSubscriber;

/// Everything the engine is wired from.
#[derive(Clone)]
pub struct EngineDeps {
    pub tasks: Arc<dyn TaskRepository>,
    pub runs: Arc<dyn TaskRunRepository>,
    pub states: Arc<dyn TriggerStateRepository>,
    pub modules: Arc<dyn ModuleConfigRepository>,
    pub inbox: Arc<dyn InboxRepository>,
    pub notifier: Arc<dyn Notifier>,
    pub models: Arc<dyn ModelResolver>,
    pub tools: Arc<dyn ToolSetBuilder>,
    pub persona: Arc<dyn PersonaSource>,
    pub costs: Option<Arc<dyn CostLookup>>,
    pub registry: Arc<TriggerRegistry>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StartReport {
    pub scheduled: usize,
    pub polling: Vec<String>,
    pub subscribed: Vec<String>,
}

pub struct Engine {
    tasks: Arc<dyn TaskRepository>,
    registry: Arc<TriggerRegistry>,
    executor: Arc<TaskExecutor>,
    scheduler: TaskScheduler,
    poller: Arc<TriggerPoller>,
    subscriber: Arc<TriggerSubscriber>,
}

impl Engine {
    pub fn new(deps: EngineDeps, config: &Config) -> Self {
        let executor = Arc::new(TaskExecutor::new(
            ExecutorPorts {
                tasks: Arc::clone(&deps.tasks),
                runs: deps.runs,
                inbox: deps.inbox,
                notifier: deps.notifier,
                models: deps.models,
                tools: deps.tools,
                persona: deps.persona,
                costs: deps.costs,
            },
            config.executor.clone(),
        ));

        let dispatch = DispatchPorts {
            registry: Arc::clone(&deps.registry),
            tasks: Arc::clone(&deps.tasks),
            modules: deps.modules,
            executor: Arc::clone(&executor),
        };

        Self {
            scheduler: TaskScheduler::new(
                Arc::clone(&executor),
                Arc::clone(&deps.tasks),
                config.scheduler.clone(),
            ),
            poller: Arc::new(TriggerPoller::new(
                dispatch.clone(),
                deps.states,
                config.triggers.clone(),
            )),
            subscriber: Arc::new(TriggerSubscriber::new(dispatch, config.triggers.clone())),
            tasks: deps.tasks,
            registry: deps.registry,
            executor,
        }
    }

    /// Arm every dispatcher. The trigger registry must already be loaded.
    pub async fn start(&self) -> DomainResult<StartReport> {
        let scheduled = self.scheduler.init().await?;
        let polling = self.poller.init().await?.started;
        let subscribed = self.subscriber.init().await?.started;
        tracing::info!(
            scheduled,
            polling = polling.len(),
            subscribed = subscribed.len(),
            "engine started"
        );
        Ok(StartReport {
            scheduled,
            polling,
            subscribed,
        })
    }

    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        self.poller.shutdown();
        self.subscriber.shutdown();
        tracing::info!("engine stopped");
    }

    /// A task was created or updated.
    pub async fn task_saved(&self, task: &Task) {
        self.scheduler.reschedule_task(task).await;
        self.refresh_triggers().await;
    }

    pub async fn task_deleted(&self, task_id: Uuid) {
        self.scheduler.unschedule_task(task_id);
        self.refresh_triggers().await;
    }

    /// Start a run in the background and return at once.
    pub async fn run_task(
        &self,
        task_id: Uuid,
        context: Option<TriggerContext>,
    ) -> DomainResult<JoinHandle<TaskRun>> {
        let task = self.tasks.get(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        Ok(self.executor.spawn_execute(task, context))
    }

    /// Run `task` and wait for its terminal record.
    pub async fn execute_now(&self, task: &Task, context: Option<&TriggerContext>) -> TaskRun {
        self.executor.execute(task, context).await
    }

    /// Reconcile with changes made to the store by another process.
    pub async fn resync(&self) -> DomainResult<SyncReport> {
        let report = self.scheduler.sync_with_store().await?;
        if report != SyncReport::default() {
            tracing::info!(armed = report.armed, removed = report.removed, "scheduler resynced");
        }
        self.refresh_triggers().await;
        Ok(report)
    }

    /// Wait for every background run to finish.
    pub async fn wait_idle(&self) {
        self.executor.wait_idle().await;
    }

    pub fn executor(&self) -> &Arc<TaskExecutor> {
        &self.executor
    }

    pub fn registry(&self) -> &Arc<TriggerRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn poller(&self) -> &Arc<TriggerPoller> {
        &self.poller
    }

    pub fn subscriber(&self) -> &Arc<TriggerSubscriber> {
        &self.subscriber
    }

    async fn refresh_triggers(&self) {
        if let Err(e) = self.poller.refresh_all().await {
            tracing::warn!(error = %e, "poller refresh failed");
        }
        if let Err(e) = self.subscriber.refresh_all().await {
            tracing::warn!(error = %e, "subscriber refresh failed");
        }
    }
}
