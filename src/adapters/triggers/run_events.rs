//! `engine:run_finished`: fires whenever a task run publishes its result.
//!
//! Task config: `{ "source_task_id": "<uuid>", "only_failures": true }`.
//! Without `source_task_id` every other task's results match.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;

use crate::domain::errors::DomainResult;
use crate::domain::models::{EngineEvent, InboxItem, TriggerEvent, TriggerSpec};
use crate::domain::ports::{EventSink, ModuleTrigger, TriggerHandler, TriggerModule, Unsubscribe};
use crate::services::event_bus::EventBus;

pub const MODULE_ID: &str = "engine";

pub struct RunEventsModule {
    bus: Arc<EventBus>,
}

impl RunEventsModule {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl TriggerModule for RunEventsModule {
    fn id(&self) -> &str {
        MODULE_ID
    }

    fn triggers(&self) -> Vec<ModuleTrigger> {
        let spec = TriggerSpec::new("Task run finished")
            .with_description("Fires when another task publishes a result")
            .subscribable()
            .filterable();
        vec![ModuleTrigger::new(
            "run_finished",
            spec,
            Arc::new(RunFinishedHandler {
                bus: Arc::clone(&self.bus),
            }),
        )]
    }
}

struct RunFinishedHandler {
    bus: Arc<EventBus>,
}

fn run_finished_event(item: &InboxItem) -> TriggerEvent {
    TriggerEvent::new(
        format!("Task '{}' finished", item.title),
        json!({
            "task_id": item.task_id,
            "run_id": item.source_run_id,
            "title": item.title,
            "failed": item.failed,
        }),
    )
}

#[async_trait]
impl TriggerHandler for RunFinishedHandler {
    async fn subscribe(&self, _config: &Value, sink: EventSink) -> DomainResult<Unsubscribe> {
        let mut events = self.bus.subscribe();
        let listener = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(EngineEvent::Inbox(item)) => sink(run_finished_event(&item)),
                    Ok(EngineEvent::Status(_)) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            skipped,
                            "run_finished listener lagged behind the event bus"
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Ok(Box::new(move || {
            listener.abort();
            Ok(())
        }))
    }

    fn filter(&self, event: &TriggerEvent, task_config: &Value) -> bool {
        if task_config.get("only_failures").and_then(Value::as_bool) == Some(true)
            && event.data.get("failed").and_then(Value::as_bool) != Some(true)
        {
            return false;
        }
        match task_config.get("source_task_id").and_then(Value::as_str) {
            Some(source) => event.data.get("task_id").and_then(Value::as_str) == Some(source),
            None => true,
        }
    }
}
