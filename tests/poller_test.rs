//! Trigger poller: one timer per trigger, single-flight polls, persisted state.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use cadence::adapters::llm::MockProvider;
use cadence::domain::models::{RunStatus, Task, TriggerKind, TriggerSpec};
use cadence::domain::ports::{
    ModuleConfigRepository, TaskRepository, TriggerModule, TriggerStateRepository,
};
use cadence::services::PollCycleOutcome;

use common::{fast_config, CountingPoller, FakeModule, Harness};

const TRIGGER: &str = "mail:inbox";

fn harness(handler: Arc<CountingPoller>) -> Harness {
    let spec = TriggerSpec::new("Inbox")
        .pollable()
        .filterable()
        .with_poll_interval_key("every_minutes");
    let module: Arc<dyn TriggerModule> =
        Arc::new(FakeModule::new("mail").with_trigger("inbox", spec, handler));
    Harness::with_modules(MockProvider::default(), vec![module], fast_config())
}

async fn set_module_config(h: &Harness, config: &serde_json::Value) {
    ModuleConfigRepository::put(h.store.as_ref(), "mail", config).await.unwrap();
}

fn mail_task(name: &str) -> Task {
    Task::new(name, "Triage the mail.", TriggerKind::Registered(TRIGGER.into()))
}

#[tokio::test(start_paused = true)]
async fn test_no_pollers_without_active_tasks() {
    let handler = Arc::new(CountingPoller::quiet());
    let h = harness(handler.clone());

    let report = h.engine.start().await.unwrap();
    assert!(report.polling.is_empty());
    assert!(h.engine.poller().active_pollers().is_empty());

    h.create(mail_task("inactive").inactive()).await;
    assert!(h.engine.poller().active_pollers().is_empty());

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(handler.poll_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_one_poller_per_trigger_regardless_of_task_count() {
    let handler = Arc::new(CountingPoller::quiet());
    let h = harness(handler.clone());
    h.engine.start().await.unwrap();

    h.create(mail_task("first")).await;
    h.create(mail_task("second")).await;
    assert_eq!(h.engine.poller().active_pollers(), vec![TRIGGER.to_string()]);

    let report = h.engine.poller().refresh_all().await.unwrap();
    assert!(report.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_poll_loop_uses_initial_delay_and_module_interval() {
    let handler = Arc::new(CountingPoller::quiet());
    let h = harness(handler.clone());
    set_module_config(&h, &json!({ "every_minutes": 2 })).await;
    h.create(mail_task("triage")).await;

    // First poll one second after the poller starts, then every two minutes.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(handler.poll_count(), 1);

    tokio::time::sleep(Duration::from_secs(119)).await;
    assert_eq!(handler.poll_count(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(handler.poll_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_last_task_disabled_stops_poller() {
    let handler = Arc::new(CountingPoller::quiet());
    let h = harness(handler.clone());
    let task = h.create(mail_task("triage")).await;
    assert!(h.engine.poller().is_polling(TRIGGER));

    h.service.set_active(task.id, false).await.unwrap();
    assert!(!h.engine.poller().is_polling(TRIGGER));

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(handler.poll_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_state_round_trips_between_polls() {
    let handler = Arc::new(CountingPoller::quiet());
    let h = harness(handler.clone());
    h.store.create(&mail_task("triage")).await.unwrap();

    h.engine.poller().poll_now(TRIGGER).await;
    h.engine.poller().poll_now(TRIGGER).await;

    assert_eq!(handler.states(), vec![serde_json::Value::Null, json!({ "polls": 1 })]);
    let stored = TriggerStateRepository::get(h.store.as_ref(), TRIGGER).await.unwrap().unwrap();
    assert_eq!(stored.state, json!({ "polls": 2 }));
    assert!(stored.last_poll_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_polls_are_skipped() {
    let handler = Arc::new(CountingPoller::quiet().with_delay(Duration::from_secs(30)));
    let h = harness(handler.clone());
    h.store.create(&mail_task("triage")).await.unwrap();

    let poller = h.engine.poller();
    let (first, second) = tokio::join!(poller.poll_now(TRIGGER), poller.poll_now(TRIGGER));

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|o| **o == PollCycleOutcome::Skipped).count(), 1);
    assert_eq!(handler.poll_count(), 1);

    // The guard is released once the poll finishes.
    assert!(matches!(poller.poll_now(TRIGGER).await, PollCycleOutcome::Completed { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_event_dispatched_to_matching_tasks_only() {
    let handler = Arc::new(CountingPoller::firing("invoice from ACME"));
    let h = harness(handler);
    let wanted = mail_task("invoices").with_trigger_config(&json!({ "keyword": "invoice" }));
    let other = mail_task("newsletters").with_trigger_config(&json!({ "keyword": "newsletter" }));
    let broken = mail_task("broken").with_raw_trigger_config("{not json");
    let inactive = mail_task("off").inactive();
    for task in [&wanted, &other, &broken, &inactive] {
        h.store.create(task).await.unwrap();
    }

    let outcome = h.engine.poller().poll_now(TRIGGER).await;
    assert_eq!(outcome, PollCycleOutcome::Completed { event: true, dispatched: 1 });

    h.engine.wait_idle().await;
    let runs = h.store.all_runs().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].task_id, wanted.id);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(h.provider.calls()[0].user, "[Trigger: invoice from ACME]\n\nTriage the mail.");
}

#[tokio::test(start_paused = true)]
async fn test_failed_poll_keeps_previous_state() {
    let handler = Arc::new(CountingPoller::failing("imap timeout"));
    let h = harness(handler);
    h.store.create(&mail_task("triage")).await.unwrap();

    let outcome = h.engine.poller().poll_now(TRIGGER).await;
    assert!(matches!(
        outcome,
        PollCycleOutcome::Failed(ref reason) if reason.contains("imap timeout")
    ));
    assert!(TriggerStateRepository::get(h.store.as_ref(), TRIGGER).await.unwrap().is_none());
    assert!(h.store.all_runs().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_poll_now_rejects_unknown_trigger() {
    let h = harness(Arc::new(CountingPoller::quiet()));
    assert_eq!(h.engine.poller().poll_now("mail:nope").await, PollCycleOutcome::NotPollable);
}

#[tokio::test(start_paused = true)]
async fn test_interval_falls_back_to_default() {
    let h = harness(Arc::new(CountingPoller::quiet()));
    let trigger = h.registry.get_trigger(TRIGGER).unwrap();

    assert_eq!(h.engine.poller().poll_interval(&trigger).await, Duration::from_secs(300));

    set_module_config(&h, &json!({ "every_minutes": "often" })).await;
    assert_eq!(h.engine.poller().poll_interval(&trigger).await, Duration::from_secs(300));

    set_module_config(&h, &json!({ "every_minutes": -3 })).await;
    assert_eq!(h.engine.poller().poll_interval(&trigger).await, Duration::from_secs(300));

    set_module_config(&h, &json!({ "every_minutes": 1e300 })).await;
    assert_eq!(h.engine.poller().poll_interval(&trigger).await, Duration::from_secs(300));

    set_module_config(&h, &json!({ "every_minutes": 0.5 })).await;
    assert_eq!(h.engine.poller().poll_interval(&trigger).await, Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_oversized_interval_keeps_poll_loop_alive() {
    let handler = Arc::new(CountingPoller::quiet());
    let h = harness(handler.clone());
    set_module_config(&h, &json!({ "every_minutes": 1e300 })).await;
    h.create(mail_task("triage")).await;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(handler.poll_count(), 1);

    // Falls back to the five minute default.
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(handler.poll_count(), 2);
    assert!(h.engine.poller().is_polling(TRIGGER));
}
