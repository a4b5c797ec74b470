//! Polling of pull-based registered triggers.
//!
//! One timer per trigger id (not per task). Each tick runs a poll cycle that
//! loads the module configuration and persisted state, calls the handler's
//! `poll`, persists the returned state, and fans any event out to matching
//! active tasks. Polls for the same trigger never overlap.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    duration_from_minutes, TriggerContext, TriggerEvent, TriggerKind, TriggerState, TriggersConfig,
};
use crate::domain::ports::{ModuleConfigRepository, TaskRepository, TriggerStateRepository};
use crate::services::task_executor::TaskExecutor;
use crate::services::trigger_registry::{RegisteredTrigger, TriggerRegistry};

/// Which dispatchers changed during a refresh.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub started: Vec<String>,
    pub stopped: Vec<String>,
}

impl RefreshReport {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty()
    }
}

/// Result of a single poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollCycleOutcome {
    /// Another poll for the same trigger was still running.
    Skipped,
    /// Unknown trigger, or one without poll capability.
    NotPollable,
    Completed { event: bool, dispatched: usize },
    Failed(String),
}

/// Marks a trigger as being polled until dropped.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    key: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, key: &str) -> Option<Self> {
        let inserted = set.lock().unwrap_or_else(PoisonError::into_inner).insert(key.to_string());
        inserted.then(|| Self {
            set,
            key: key.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Collaborators shared by the poller and the subscriber.
#[derive(Clone)]
pub struct DispatchPorts {
    pub registry: Arc<TriggerRegistry>,
    pub tasks: Arc<dyn TaskRepository>,
    pub modules: Arc<dyn ModuleConfigRepository>,
    pub executor: Arc<TaskExecutor>,
}

impl DispatchPorts {
    pub(crate) async fn module_config(&self, module_id: &str) -> DomainResult<Value> {
        Ok(self
            .modules
            .get(module_id)
            .await?
            .unwrap_or_else(|| Value::Object(serde_json::Map::new())))
    }

    /// Ids of registered triggers with at least one active task.
    pub(crate) async fn triggers_in_use(&self) -> DomainResult<HashSet<String>> {
        Ok(self
            .active_registrations()
            .await?
            .into_iter()
            .map(|(trigger_id, _)| trigger_id)
            .collect())
    }

    /// `(trigger id, task id)` for every active task on a registered trigger.
    pub(crate) async fn active_registrations(&self) -> DomainResult<HashSet<(String, Uuid)>> {
        Ok(self
            .tasks
            .list_active(None)
            .await?
            .into_iter()
            .filter_map(|t| {
                t.trigger_type
                    .registered_id()
                    .map(|id| (id.to_string(), t.id))
            })
            .collect())
    }
}

pub struct TriggerPoller {
    ports: DispatchPorts,
    states: Arc<dyn TriggerStateRepository>,
    config: TriggersConfig,
    pollers: Mutex<HashMap<String, JoinHandle<()>>>,
    in_flight: Mutex<HashSet<String>>,
}

impl TriggerPoller {
    pub fn new(
        ports: DispatchPorts,
        states: Arc<dyn TriggerStateRepository>,
        config: TriggersConfig,
    ) -> Self {
        Self {
            ports,
            states,
            config,
            pollers: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub async fn init(self: &Arc<Self>) -> DomainResult<RefreshReport> {
        let report = self.refresh_all().await?;
        tracing::info!(started = report.started.len(), "trigger poller initialized");
        Ok(report)
    }

    /// Start pollers for polled triggers that gained active tasks and stop
    /// those that lost them. Running pollers that are still wanted are kept.
    pub async fn refresh_all(self: &Arc<Self>) -> DomainResult<RefreshReport> {
        let in_use = self.ports.triggers_in_use().await?;
        let wanted: HashMap<String, RegisteredTrigger> = self
            .ports
            .registry
            .all()
            .into_iter()
            .filter(|t| t.spec.is_polled() && in_use.contains(&t.full_id))
            .map(|t| (t.full_id.clone(), t))
            .collect();

        let mut report = RefreshReport::default();
        let mut pollers = self.lock_pollers();

        pollers.retain(|id, handle| {
            if wanted.contains_key(id) && !handle.is_finished() {
                return true;
            }
            handle.abort();
            if !wanted.contains_key(id) {
                report.stopped.push(id.clone());
            }
            false
        });

        for (id, trigger) in wanted {
            if pollers.contains_key(&id) {
                continue;
            }
            let initial_delay = Duration::from_secs(self.config.initial_poll_delay_secs);
            let handle = tokio::spawn(run_poller(Arc::downgrade(self), trigger, initial_delay));
            pollers.insert(id.clone(), handle);
            report.started.push(id);
        }
        drop(pollers);

        report.started.sort();
        report.stopped.sort();
        for id in &report.started {
            tracing::info!(trigger_id = %id, "poller started");
        }
        for id in &report.stopped {
            tracing::info!(trigger_id = %id, "poller stopped");
        }
        Ok(report)
    }

    /// Run one poll cycle for `trigger_id` now. Never returns an error.
    pub async fn poll_now(&self, trigger_id: &str) -> PollCycleOutcome {
        let pollable = self.ports.registry.get_trigger(trigger_id).filter(|t| t.spec.can_poll);
        let Some(trigger) = pollable else {
            return PollCycleOutcome::NotPollable;
        };

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, trigger_id) else {
            tracing::debug!(trigger_id, "poll already in flight, skipping tick");
            return PollCycleOutcome::Skipped;
        };

        match self.poll_cycle(&trigger).await {
            Ok((event, dispatched)) => PollCycleOutcome::Completed { event, dispatched },
            Err(e) => {
                tracing::warn!(trigger_id, error = %e, "poll failed");
                PollCycleOutcome::Failed(e.to_string())
            }
        }
    }

    pub fn shutdown(&self) {
        for (_, handle) in self.lock_pollers().drain() {
            handle.abort();
        }
        tracing::info!("trigger poller stopped");
    }

    pub fn is_polling(&self, trigger_id: &str) -> bool {
        self.lock_pollers().contains_key(trigger_id)
    }

    pub fn active_pollers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock_pollers().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Poll interval: the module's configured value at the trigger's declared
    /// key when it is a positive number of minutes, otherwise the default.
    pub async fn poll_interval(&self, trigger: &RegisteredTrigger) -> Duration {
        let default_minutes = self.config.default_poll_interval_minutes.max(1);
        let default = Duration::from_secs(default_minutes.saturating_mul(60));
        let Some(key) = trigger.spec.poll_interval_key.as_deref() else {
            return default;
        };
        match self.ports.module_config(&trigger.module_id).await {
            Ok(config) => config
                .get(key)
                .and_then(Value::as_f64)
                .and_then(duration_from_minutes)
                .unwrap_or(default),
            Err(e) => {
                tracing::warn!(
                    trigger_id = %trigger.full_id,
                    error = %e,
                    "could not read module config, using default interval"
                );
                default
            }
        }
    }

    async fn poll_cycle(&self, trigger: &RegisteredTrigger) -> DomainResult<(bool, usize)> {
        let config = self.ports.module_config(&trigger.module_id).await?;
        let previous = self
            .states
            .get(&trigger.full_id)
            .await?
            .map_or(Value::Null, |s| s.state);

        let outcome = trigger.handler.poll(&config, &previous).await?;

        self.states
            .put(&TriggerState {
                trigger_id: trigger.full_id.clone(),
                state: outcome.new_state,
                last_poll_at: Some(Utc::now()),
            })
            .await?;

        match outcome.event {
            Some(event) => {
                tracing::info!(
                    trigger_id = %trigger.full_id,
                    summary = ?event.summary,
                    "trigger fired"
                );
                let dispatched = self.dispatch(trigger, &event).await?;
                Ok((true, dispatched))
            }
            None => Ok((false, 0)),
        }
    }

    async fn dispatch(
        &self,
        trigger: &RegisteredTrigger,
        event: &TriggerEvent,
    ) -> DomainResult<usize> {
        let kind = TriggerKind::Registered(trigger.full_id.clone());
        let mut dispatched = 0;
        for task in self.ports.tasks.list_active(Some(&kind)).await? {
            if !trigger.matches(event, &task) {
                continue;
            }
            let context = TriggerContext::from_event(&trigger.full_id, event);
            self.ports.executor.spawn_execute(task, Some(context));
            dispatched += 1;
        }
        Ok(dispatched)
    }

    fn lock_pollers(&self) -> std::sync::MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.pollers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TriggerPoller {
    fn drop(&mut self) {
        for (_, handle) in self.lock_pollers().drain() {
            handle.abort();
        }
    }
}

async fn run_poller(
    poller: Weak<TriggerPoller>,
    trigger: RegisteredTrigger,
    initial_delay: Duration,
) {
    let period = match poller.upgrade() {
        Some(p) => p.poll_interval(&trigger).await.max(Duration::from_secs(1)),
        None => return,
    };
    tracing::debug!(
        trigger_id = %trigger.full_id,
        period_secs = period.as_secs(),
        "poll loop armed"
    );

    tokio::time::sleep(initial_delay).await;
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(poller) = poller.upgrade() else {
            break;
        };
        let trigger_id = trigger.full_id.clone();
        tokio::spawn(async move {
            poller.poll_now(&trigger_id).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard_is_exclusive_and_released() {
        let set = Mutex::new(HashSet::new());
        let first = InFlightGuard::acquire(&set, "mail:inbox");
        assert!(first.is_some());
        assert!(InFlightGuard::acquire(&set, "mail:inbox").is_none());
        assert!(InFlightGuard::acquire(&set, "web:watch").is_some());

        drop(first);
        assert!(InFlightGuard::acquire(&set, "mail:inbox").is_some());
    }
}
