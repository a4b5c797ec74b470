//! Task executor: runs one task against the model and records the outcome.
//!
//! [`TaskExecutor::execute`] never returns an error. Every invocation ends in
//! exactly one terminal [`TaskRun`] and one published result artifact, whether
//! the model answered, failed, or no provider was configured at all.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::domain::errors::DomainError;
use crate::domain::models::{
    AgentStatus, ExecutorConfig, InboxItem, RunStatus, Task, TaskRun, TriggerContext, UsageSummary,
};
use crate::domain::ports::{
    CostLookup, GenerateRequest, InboxRepository, ModelResolver, Notifier, PersonaSource,
    ProviderError, TaskRepository, TaskRunRepository, ToolSetBuilder,
};

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("no model provider configured")]
    NoProvider,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("execution panicked: {0}")]
    Panicked(String),
}

/// Collaborators the executor talks to.
#[derive(Clone)]
pub struct ExecutorPorts {
    pub tasks: Arc<dyn TaskRepository>,
    pub runs: Arc<dyn TaskRunRepository>,
    pub inbox: Arc<dyn InboxRepository>,
    pub notifier: Arc<dyn Notifier>,
    pub models: Arc<dyn ModelResolver>,
    pub tools: Arc<dyn ToolSetBuilder>,
    pub persona: Arc<dyn PersonaSource>,
    pub costs: Option<Arc<dyn CostLookup>>,
}

pub struct TaskExecutor {
    ports: ExecutorPorts,
    config: ExecutorConfig,
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Counts a spawned run until it finishes or is cancelled.
struct RunSlot(Arc<TaskExecutor>);

impl RunSlot {
    fn claim(executor: &Arc<TaskExecutor>) -> Self {
        executor.in_flight.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(executor))
    }
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

struct Answer {
    text: String,
    usage: UsageSummary,
}

impl TaskExecutor {
    pub fn new(ports: ExecutorPorts, config: ExecutorConfig) -> Self {
        Self {
            ports,
            config,
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    /// Run `task` once and return the terminal run record.
    pub async fn execute(&self, task: &Task, context: Option<&TriggerContext>) -> TaskRun {
        self.ports.notifier.publish_status(AgentStatus::Thinking);

        let mut run = TaskRun::start(task.id);
        tracing::info!(task_id = %task.id, run_id = %run.id, task = %task.name, "task run started");

        let (inserted, outcome) = match self.ports.runs.create(&run).await {
            Ok(()) => {
                let outcome = AssertUnwindSafe(self.answer(task, context))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(ExecutionError::Panicked(panic_message(&*panic))));
                (true, outcome)
            }
            Err(e) => (false, Err(ExecutionError::Domain(e))),
        };

        let item = match outcome {
            Ok(answer) => {
                let content = if answer.text.trim().is_empty() {
                    self.config.empty_output_placeholder.clone()
                } else {
                    answer.text.clone()
                };
                if let Err(e) = run.complete(answer.text, Some(answer.usage)) {
                    tracing::error!(run_id = %run.id, error = %e, "could not complete run");
                }
                InboxItem::task_result(task.id, run.id, task.name.clone(), content, false)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(
                    task_id = %task.id,
                    run_id = %run.id,
                    error = %message,
                    "task run failed"
                );
                if let Err(e) = run.fail(message.clone()) {
                    tracing::error!(run_id = %run.id, error = %e, "could not fail run");
                }
                let title = format!("{}{}", self.config.failure_title_prefix, task.name);
                InboxItem::task_result(task.id, run.id, title, message, true)
            }
        };

        self.record(task, &run, &item, inserted).await;
        self.ports.notifier.publish_status(AgentStatus::Idle);

        if run.status == RunStatus::Completed {
            tracing::info!(task_id = %task.id, run_id = %run.id, "task run completed");
        }
        run
    }

    /// Fire-and-forget wrapper used by every dispatcher.
    pub fn spawn_execute(
        self: &Arc<Self>,
        task: Task,
        context: Option<TriggerContext>,
    ) -> JoinHandle<TaskRun> {
        let slot = RunSlot::claim(self);
        tokio::spawn(async move {
            let run = slot.0.execute(&task, context.as_ref()).await;
            drop(slot);
            run
        })
    }

    /// Runs started with [`spawn_execute`](Self::spawn_execute) that have not finished.
    pub fn runs_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Resolve once no spawned run is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.runs_in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    async fn answer(
        &self,
        task: &Task,
        context: Option<&TriggerContext>,
    ) -> Result<Answer, ExecutionError> {
        let provider = self.ports.models.resolve().await.ok_or(ExecutionError::NoProvider)?;

        let persona = self.ports.persona.system_prompt().await?;
        let tools = self.ports.tools.build_tool_set(task.tools_filter.as_deref()).await?;
        let system = compose_system_prompt(&persona, &tools.prompt_fragments);
        let max_steps = (!tools.is_empty()).then_some(self.config.max_steps);

        let generation = provider
            .generate(GenerateRequest {
                system,
                user: build_user_content(task, context),
                tools,
                max_steps,
            })
            .await?;

        let mut usage =
            UsageSummary::new(generation.usage.input_tokens, generation.usage.output_tokens);
        if !generation.model.is_empty() {
            if let Some(costs) = &self.ports.costs {
                match costs.cost_usd(&generation.model, &generation.usage).await {
                    Ok(cost) => usage.cost_usd = cost,
                    Err(e) => {
                        tracing::debug!(model = %generation.model, error = %e, "cost lookup failed")
                    }
                }
            }
            usage.model = Some(generation.model);
        }

        Ok(Answer {
            text: generation.text,
            usage,
        })
    }

    /// Persist the run, the task's last-run time and the artifact, then publish.
    /// A run whose initial insert failed is inserted here in its terminal state.
    async fn record(&self, task: &Task, run: &TaskRun, item: &InboxItem, inserted: bool) {
        let persisted = if inserted {
            self.ports.runs.update(run).await
        } else {
            self.ports.runs.create(run).await
        };
        if let Err(e) = persisted {
            tracing::error!(
                run_id = %run.id,
                error = %e,
                "failed to persist task run, run is not durable"
            );
        }
        let finished = run.completed_at.unwrap_or_else(Utc::now);
        if let Err(e) = self.ports.tasks.record_last_run(task.id, finished).await {
            tracing::error!(task_id = %task.id, error = %e, "failed to record last run");
        }
        if let Err(e) = self.ports.inbox.create(item).await {
            tracing::error!(run_id = %run.id, error = %e, "failed to store result artifact");
        }
        self.ports.notifier.publish_inbox(item);
    }
}

/// The action prompt, annotated with the trigger summary when there is one.
pub fn build_user_content(task: &Task, context: Option<&TriggerContext>) -> String {
    match context.and_then(|c| c.summary.as_deref()) {
        Some(summary) if !summary.is_empty() => {
            format!("[Trigger: {summary}]\n\n{}", task.action_prompt)
        }
        _ => task.action_prompt.clone(),
    }
}

fn compose_system_prompt(persona: &str, fragments: &[String]) -> String {
    std::iter::once(persona)
        .chain(fragments.iter().map(String::as_str))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
