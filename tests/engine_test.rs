//! Engine facade: start report, store resync and task lifecycle hooks.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use cadence::adapters::llm::MockProvider;
use cadence::domain::models::{Task, TriggerKind, TriggerSpec};
use cadence::domain::ports::{TaskRepository, TriggerModule};
use cadence::services::SyncReport;

use common::{fast_config, CapturingSubscriber, CountingPoller, FakeModule, Harness};

fn every_minutes(name: &str, minutes: u64) -> Task {
    Task::new(name, "Tick.", TriggerKind::Interval)
        .with_trigger_config(&json!({ "interval_minutes": minutes }))
}

fn harness_with_triggers() -> Harness {
    let poll_spec = TriggerSpec::new("Feed").pollable();
    let push_spec = TriggerSpec::new("Chat").subscribable();
    let module: Arc<dyn TriggerModule> = Arc::new(
        FakeModule::new("demo")
            .with_trigger("feed", poll_spec, Arc::new(CountingPoller::quiet()))
            .with_trigger("chat", push_spec, Arc::new(CapturingSubscriber::default())),
    );
    Harness::with_modules(MockProvider::default(), vec![module], fast_config())
}

#[tokio::test(start_paused = true)]
async fn test_start_reports_what_was_armed() {
    let h = harness_with_triggers();
    for task in [
        every_minutes("tick", 5),
        Task::new("feed", "p", TriggerKind::Registered("demo:feed".into())),
        Task::new("chat", "p", TriggerKind::Registered("demo:chat".into())),
        Task::new("by-hand", "p", TriggerKind::Manual),
    ] {
        h.store.create(&task).await.unwrap();
    }

    let report = h.engine.start().await.unwrap();

    assert_eq!(report.scheduled, 1);
    assert_eq!(report.polling, vec!["demo:feed".to_string()]);
    assert_eq!(report.subscribed, vec!["demo:chat".to_string()]);

    h.engine.shutdown();
    assert_eq!(h.engine.scheduler().scheduled_count(), 0);
    assert!(h.engine.poller().active_pollers().is_empty());
    assert!(h.engine.subscriber().active_subscriptions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resync_picks_up_external_changes() {
    let h = Harness::new(MockProvider::default());
    h.engine.start().await.unwrap();

    // Another process adds one task and later removes it.
    let task = every_minutes("external", 1);
    h.store.create(&task).await.unwrap();
    assert!(!h.engine.scheduler().is_scheduled(task.id));

    let report = h.engine.resync().await.unwrap();
    assert_eq!(report, SyncReport { armed: 1, removed: 0 });
    assert!(h.engine.scheduler().is_scheduled(task.id));

    h.store.delete(task.id).await.unwrap();
    let report = h.engine.resync().await.unwrap();
    assert_eq!(report, SyncReport { armed: 0, removed: 1 });
}

#[tokio::test(start_paused = true)]
async fn test_resync_leaves_unchanged_timers_alone() {
    let h = Harness::new(MockProvider::default());
    let task = h.create(every_minutes("tick", 1)).await;

    tokio::time::sleep(Duration::from_secs(40)).await;
    assert_eq!(h.engine.resync().await.unwrap(), SyncReport::default());

    // Still fires at the original 60s mark rather than 40s + 60s.
    tokio::time::sleep(Duration::from_secs(21)).await;
    h.engine.wait_idle().await;
    assert_eq!(h.store.all_runs().await.len(), 1);
    assert!(h.engine.scheduler().is_scheduled(task.id));
}

#[tokio::test(start_paused = true)]
async fn test_resync_rearms_changed_schedule() {
    let h = Harness::new(MockProvider::default());
    let mut task = h.create(every_minutes("tick", 1)).await;

    task.trigger_config = json!({ "interval_minutes": 10 }).to_string();
    h.store.update(&task).await.unwrap();
    assert_eq!(h.engine.resync().await.unwrap(), SyncReport { armed: 1, removed: 0 });

    tokio::time::sleep(Duration::from_secs(61)).await;
    h.engine.wait_idle().await;
    assert!(h.store.all_runs().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_run_uses_latest_stored_prompt() {
    let h = Harness::new(MockProvider::default());
    let mut task = h.create(every_minutes("tick", 1)).await;

    task.action_prompt = "Tock.".to_string();
    h.store.update(&task).await.unwrap();

    tokio::time::sleep(Duration::from_secs(61)).await;
    h.engine.wait_idle().await;
    assert_eq!(h.provider.calls()[0].user, "Tock.");
}
