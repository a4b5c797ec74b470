//! Trigger subscriber: live subscriptions, per-task filter and cooldown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use cadence::adapters::llm::MockProvider;
use cadence::adapters::triggers::builtin_modules;
use cadence::domain::models::{Task, TriggerEvent, TriggerKind, TriggerSpec};
use cadence::domain::ports::TriggerModule;

use common::{fast_config, settle, CapturingSubscriber, FakeModule, Harness};

const TRIGGER: &str = "chat:message";

fn harness(handler: Arc<CapturingSubscriber>) -> Harness {
    let spec = TriggerSpec::new("Chat message").subscribable();
    let module: Arc<dyn TriggerModule> =
        Arc::new(FakeModule::new("chat").with_trigger("message", spec, handler));
    Harness::with_modules(MockProvider::default(), vec![module], fast_config())
}

fn chat_task(name: &str) -> Task {
    Task::new(name, "Reply to the message.", TriggerKind::Registered(TRIGGER.into()))
}

fn message(text: &str) -> TriggerEvent {
    TriggerEvent::new(format!("New message: {text}"), json!({ "text": text }))
}

async fn deliver(h: &Harness, handler: &CapturingSubscriber, text: &str) {
    assert!(handler.emit(message(text)), "no live subscription");
    settle().await;
    h.engine.wait_idle().await;
}

#[tokio::test(start_paused = true)]
async fn test_subscribes_once_per_trigger_with_active_tasks() {
    let handler = Arc::new(CapturingSubscriber::default());
    let h = harness(handler.clone());

    let report = h.engine.start().await.unwrap();
    assert!(report.subscribed.is_empty());
    assert_eq!(handler.subscribe_count(), 0);

    h.create(chat_task("first")).await;
    h.create(chat_task("second")).await;
    assert_eq!(handler.subscribe_count(), 1);
    assert_eq!(h.engine.subscriber().active_subscriptions(), vec![TRIGGER.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_suppresses_repeat_dispatch() {
    let handler = Arc::new(CapturingSubscriber::default());
    let h = harness(handler.clone());
    h.create(chat_task("reply").with_trigger_config(&json!({ "cooldown_seconds": 30 })))
        .await;

    deliver(&h, &handler, "hello").await;
    deliver(&h, &handler, "hello again").await;
    assert_eq!(h.store.all_runs().await.len(), 1);

    tokio::time::sleep(Duration::from_secs(31)).await;
    deliver(&h, &handler, "still there?").await;
    assert_eq!(h.store.all_runs().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_default_cooldown_applies_per_task() {
    let handler = Arc::new(CapturingSubscriber::default());
    let h = harness(handler.clone());
    h.create(chat_task("one")).await;
    h.create(chat_task("two")).await;

    deliver(&h, &handler, "hi").await;
    assert_eq!(h.store.all_runs().await.len(), 2);

    tokio::time::sleep(Duration::from_secs(59)).await;
    deliver(&h, &handler, "hi").await;
    assert_eq!(h.store.all_runs().await.len(), 2);

    tokio::time::sleep(Duration::from_secs(2)).await;
    deliver(&h, &handler, "hi").await;
    assert_eq!(h.store.all_runs().await.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribes_when_last_task_goes_away() {
    let handler = Arc::new(CapturingSubscriber::default());
    let h = harness(handler.clone());
    let task = h.create(chat_task("reply")).await;

    h.service.delete_task(task.id).await.unwrap();
    assert_eq!(handler.unsubscribe_count(), 1);
    assert!(!h.engine.subscriber().is_subscribed(TRIGGER));

    // A late event through the old sink is dropped.
    handler.emit(message("anyone?"));
    settle().await;
    h.engine.wait_idle().await;
    assert!(h.store.all_runs().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_unsubscribes_everything() {
    let handler = Arc::new(CapturingSubscriber::default());
    let h = harness(handler.clone());
    h.create(chat_task("reply")).await;

    h.engine.shutdown();
    assert_eq!(handler.unsubscribe_count(), 1);
    assert!(h.engine.subscriber().active_subscriptions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_finished_chains_without_feedback_loop() {
    let h = Harness::new(MockProvider::default());
    h.registry.load_modules(&builtin_modules(&h.bus));
    h.engine.start().await.unwrap();

    let source = h.create(Task::new("collect", "Collect metrics.", TriggerKind::Manual)).await;
    let follower = h
        .create(Task::new(
            "report",
            "Write the report.",
            TriggerKind::Registered("engine:run_finished".into()),
        ))
        .await;
    assert!(h.engine.subscriber().is_subscribed("engine:run_finished"));

    h.engine.run_task(source.id, None).await.unwrap();
    for _ in 0..5 {
        settle().await;
        h.engine.wait_idle().await;
    }

    let runs = h.store.all_runs().await;
    assert_eq!(runs.len(), 2);
    assert_eq!(runs.iter().filter(|r| r.task_id == follower.id).count(), 1);
    assert!(h.provider.calls()[1].user.starts_with("[Trigger: Task 'collect' finished]"));
}

#[tokio::test(start_paused = true)]
async fn test_event_delivered_while_subscribing_is_dispatched() {
    let handler = Arc::new(CapturingSubscriber::default().with_greeting(message("early")));
    let h = harness(handler.clone());

    h.create(chat_task("reply")).await;
    settle().await;
    h.engine.wait_idle().await;

    assert!(h.engine.subscriber().is_subscribed(TRIGGER));
    assert_eq!(h.store.all_runs().await.len(), 1);
    assert!(h.provider.calls()[0].user.starts_with("[Trigger: New message: early]"));
}

#[tokio::test(start_paused = true)]
async fn test_cooldowns_dropped_for_tasks_no_longer_active() {
    let handler = Arc::new(CapturingSubscriber::default());
    let h = harness(handler.clone());
    let one = h.create(chat_task("one")).await;
    let two = h.create(chat_task("two")).await;

    deliver(&h, &handler, "hi").await;
    assert_eq!(h.engine.subscriber().cooldown_entries(), 2);

    h.service.delete_task(two.id).await.unwrap();
    assert!(h.engine.subscriber().is_subscribed(TRIGGER));
    assert_eq!(h.engine.subscriber().cooldown_entries(), 1);

    // A re-enabled task starts a fresh window.
    h.service.set_active(one.id, false).await.unwrap();
    assert_eq!(h.engine.subscriber().cooldown_entries(), 0);
    h.service.set_active(one.id, true).await.unwrap();
    deliver(&h, &handler, "hi again").await;
    assert_eq!(h.store.all_runs().await.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_cooldown_does_not_break_dispatch() {
    let handler = Arc::new(CapturingSubscriber::default());
    let h = harness(handler.clone());
    h.create(chat_task("once").with_trigger_config(&json!({ "cooldown_seconds": 1e300 })))
        .await;
    h.create(chat_task("regular")).await;

    deliver(&h, &handler, "hi").await;
    assert_eq!(h.store.all_runs().await.len(), 2);

    tokio::time::sleep(Duration::from_secs(61)).await;
    deliver(&h, &handler, "hi").await;
    assert_eq!(h.store.all_runs().await.len(), 3);
}
