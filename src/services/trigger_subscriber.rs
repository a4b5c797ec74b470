//! Push-based registered triggers.
//!
//! One live subscription per subscribe-capable trigger that has active tasks.
//! Delivered events are filtered per task and throttled by a per-(trigger,
//! task) cooldown before the executor is invoked.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{TriggerContext, TriggerEvent, TriggerKind, TriggersConfig};
use crate::domain::ports::{EventSink, Unsubscribe};
use crate::services::trigger_poller::{DispatchPorts, RefreshReport};
use crate::services::trigger_registry::RegisteredTrigger;

pub struct TriggerSubscriber {
    ports: DispatchPorts,
    config: TriggersConfig,
    subscriptions: Mutex<HashMap<String, Unsubscribe>>,
    /// Triggers whose `subscribe` call has not returned yet. Events they
    /// deliver in the meantime are dispatched.
    starting: Mutex<HashSet<String>>,
    last_dispatch: Mutex<HashMap<(String, Uuid), Instant>>,
}

impl TriggerSubscriber {
    pub fn new(ports: DispatchPorts, config: TriggersConfig) -> Self {
        Self {
            ports,
            config,
            subscriptions: Mutex::new(HashMap::new()),
            starting: Mutex::new(HashSet::new()),
            last_dispatch: Mutex::new(HashMap::new()),
        }
    }

    pub async fn init(self: &Arc<Self>) -> DomainResult<RefreshReport> {
        let report = self.refresh_all().await?;
        tracing::info!(started = report.started.len(), "trigger subscriber initialized");
        Ok(report)
    }

    /// Subscribe to newly relevant triggers and unsubscribe from those with no
    /// remaining active tasks. A failed subscribe is only retried on the next
    /// refresh. Cooldowns of tasks that are no longer active are dropped.
    pub async fn refresh_all(self: &Arc<Self>) -> DomainResult<RefreshReport> {
        let registrations = self.ports.active_registrations().await?;
        let in_use: HashSet<&str> = registrations.iter().map(|(id, _)| id.as_str()).collect();
        let wanted: Vec<RegisteredTrigger> = self
            .ports
            .registry
            .all()
            .into_iter()
            .filter(|t| t.spec.can_subscribe && in_use.contains(t.full_id.as_str()))
            .collect();

        let mut report = RefreshReport::default();

        let stale: Vec<(String, Unsubscribe)> = {
            let mut subs = self.lock_subscriptions();
            let ids: Vec<String> = subs
                .keys()
                .filter(|id| !wanted.iter().any(|t| &t.full_id == *id))
                .cloned()
                .collect();
            ids.into_iter()
                .filter_map(|id| subs.remove(&id).map(|unsub| (id, unsub)))
                .collect()
        };
        for (id, unsubscribe) in stale {
            self.forget_cooldowns(&id);
            call_unsubscribe(&id, unsubscribe);
            report.stopped.push(id);
        }
        self.lock_cooldowns().retain(|pair, _| registrations.contains(pair));

        for trigger in wanted {
            if self.is_subscribed(&trigger.full_id) {
                continue;
            }
            if self.start(&trigger).await {
                report.started.push(trigger.full_id);
            }
        }

        report.started.sort();
        report.stopped.sort();
        Ok(report)
    }

    /// Handle one delivered event. Returns how many runs were started.
    pub async fn dispatch_event(&self, trigger_id: &str, event: TriggerEvent) -> usize {
        if !self.is_subscribed(trigger_id) && !self.lock_starting().contains(trigger_id) {
            tracing::debug!(trigger_id, "event for inactive subscription dropped");
            return 0;
        }
        let Some(trigger) = self.ports.registry.get_trigger(trigger_id) else {
            return 0;
        };

        let kind = TriggerKind::Registered(trigger.full_id.clone());
        let tasks = match self.ports.tasks.list_active(Some(&kind)).await {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!(trigger_id, error = %e, "could not load tasks for event");
                return 0;
            }
        };

        let default_cooldown = Duration::from_secs(self.config.default_cooldown_secs);
        let mut dispatched = 0;
        for task in tasks {
            if !trigger.matches(&event, &task) {
                continue;
            }
            if !self.enter_cooldown(trigger_id, task.id, task.cooldown(default_cooldown)) {
                tracing::debug!(trigger_id, task_id = %task.id, "dispatch suppressed by cooldown");
                continue;
            }
            let context = TriggerContext::from_event(trigger_id, &event);
            self.ports.executor.spawn_execute(task, Some(context));
            dispatched += 1;
        }
        dispatched
    }

    /// Unsubscribe everything and forget all cooldowns.
    pub fn shutdown(&self) {
        let subs: Vec<(String, Unsubscribe)> = self.lock_subscriptions().drain().collect();
        for (id, unsubscribe) in subs {
            call_unsubscribe(&id, unsubscribe);
        }
        self.lock_starting().clear();
        self.lock_cooldowns().clear();
        tracing::info!("trigger subscriber stopped");
    }

    pub fn is_subscribed(&self, trigger_id: &str) -> bool {
        self.lock_subscriptions().contains_key(trigger_id)
    }

    pub fn active_subscriptions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock_subscriptions().keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn start(self: &Arc<Self>, trigger: &RegisteredTrigger) -> bool {
        let config = match self.ports.module_config(&trigger.module_id).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    trigger_id = %trigger.full_id,
                    error = %e,
                    "could not load module config"
                );
                return false;
            }
        };

        {
            let mut starting = self.lock_starting();
            // A concurrent refresh is already on it.
            if self.is_subscribed(&trigger.full_id) || !starting.insert(trigger.full_id.clone()) {
                return false;
            }
        }

        let result = trigger.handler.subscribe(&config, self.event_sink(&trigger.full_id)).await;
        // Cleared by shutdown while the handler was subscribing.
        let still_wanted = self.lock_starting().remove(&trigger.full_id);

        match result {
            Ok(unsubscribe) if still_wanted => {
                self.lock_subscriptions().insert(trigger.full_id.clone(), unsubscribe);
                tracing::info!(trigger_id = %trigger.full_id, "subscription started");
                true
            }
            Ok(unsubscribe) => {
                call_unsubscribe(&trigger.full_id, unsubscribe);
                false
            }
            Err(e) => {
                tracing::warn!(trigger_id = %trigger.full_id, error = %e, "subscribe failed");
                false
            }
        }
    }

    fn event_sink(self: &Arc<Self>, trigger_id: &str) -> EventSink {
        let subscriber = Arc::downgrade(self);
        let runtime = tokio::runtime::Handle::current();
        let trigger_id = trigger_id.to_string();
        Arc::new(move |event: TriggerEvent| {
            let Some(subscriber) = subscriber.upgrade() else {
                return;
            };
            let trigger_id = trigger_id.clone();
            runtime.spawn(async move {
                subscriber.dispatch_event(&trigger_id, event).await;
            });
        })
    }

    /// Record a dispatch for the pair unless the last one is within `cooldown`.
    fn enter_cooldown(&self, trigger_id: &str, task_id: Uuid, cooldown: Duration) -> bool {
        let now = Instant::now();
        let mut last = self.lock_cooldowns();
        let key = (trigger_id.to_string(), task_id);
        if let Some(previous) = last.get(&key) {
            if now.duration_since(*previous) < cooldown {
                return false;
            }
        }
        last.insert(key, now);
        true
    }

    fn forget_cooldowns(&self, trigger_id: &str) {
        self.lock_cooldowns().retain(|(id, _), _| id != trigger_id);
    }

    /// Cooldown entries currently held, one per `(trigger, task)` pair.
    pub fn cooldown_entries(&self) -> usize {
        self.lock_cooldowns().len()
    }

    fn lock_cooldowns(&self) -> std::sync::MutexGuard<'_, HashMap<(String, Uuid), Instant>> {
        self.last_dispatch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_starting(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.starting.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscriptions(&self) -> std::sync::MutexGuard<'_, HashMap<String, Unsubscribe>> {
        self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TriggerSubscriber {
    fn drop(&mut self) {
        let subs: Vec<(String, Unsubscribe)> = self.lock_subscriptions().drain().collect();
        for (id, unsubscribe) in subs {
            call_unsubscribe(&id, unsubscribe);
        }
    }
}

fn call_unsubscribe(trigger_id: &str, unsubscribe: Unsubscribe) {
    match std::panic::catch_unwind(AssertUnwindSafe(unsubscribe)) {
        Ok(Ok(())) => tracing::info!(trigger_id, "subscription stopped"),
        Ok(Err(e)) => tracing::warn!(trigger_id, error = %e, "unsubscribe failed"),
        Err(_) => tracing::warn!(trigger_id, "unsubscribe panicked"),
    }
}
