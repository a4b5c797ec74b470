//! Common test utilities for integration tests
//!
//! Fake trigger handlers and modules, a panicking model provider, and a
//! harness that wires an [`Engine`] to in-memory stores and a scripted
//! [`MockProvider`].
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use cadence::adapters::llm::{ConfiguredModelResolver, MockProvider};
use cadence::adapters::memory::MemoryStore;
use cadence::adapters::tools::ToolRegistry;
use cadence::domain::errors::{DomainError, DomainResult};
use cadence::domain::models::{Config, PollOutcome, Task, TaskRun, TriggerEvent, TriggerSpec};
use cadence::domain::ports::{
    EventSink, GenerateRequest, Generation, ModelProvider, ModuleTrigger, PersonaSource,
    ProviderError, TaskRunRepository, TriggerHandler, TriggerModule, Unsubscribe,
};
use uuid::Uuid;
use cadence::services::{Engine, EngineDeps, EventBus, PricingTable, TaskService, TriggerRegistry};

/// Install a test-writer subscriber. Safe to call from every test.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Let spawned tasks run without moving the clock.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

pub struct StaticPersona;

#[async_trait]
impl PersonaSource for StaticPersona {
    async fn system_prompt(&self) -> DomainResult<String> {
        Ok("You are a test assistant.".to_string())
    }
}

pub struct PanickingProvider;

#[async_trait]
impl ModelProvider for PanickingProvider {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn generate(&self, _request: GenerateRequest) -> Result<Generation, ProviderError> {
        panic!("provider exploded")
    }
}

/// Poll handler that counts calls and optionally fires on every poll.
///
/// State is `{"polls": n}`. Events carry the summary given at construction.
/// Task configs may set `{"keyword": "..."}` to match only summaries that
/// contain it.
pub struct CountingPoller {
    pub polls: AtomicUsize,
    pub delay: Duration,
    pub fire_summary: Option<String>,
    pub fail_with: Option<String>,
    pub seen_states: Mutex<Vec<Value>>,
}

impl CountingPoller {
    pub fn quiet() -> Self {
        Self {
            polls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fire_summary: None,
            fail_with: None,
            seen_states: Mutex::new(Vec::new()),
        }
    }

    pub fn firing(summary: &str) -> Self {
        Self {
            fire_summary: Some(summary.to_string()),
            ..Self::quiet()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::quiet()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn states(&self) -> Vec<Value> {
        self.seen_states.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl TriggerHandler for CountingPoller {
    async fn poll(&self, _config: &Value, state: &Value) -> DomainResult<PollOutcome> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(state.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(message) = &self.fail_with {
            return Err(DomainError::ExecutionFailed(message.clone()));
        }
        let new_state = json!({ "polls": n });
        Ok(match &self.fire_summary {
            Some(summary) => {
                PollOutcome::fired(new_state, TriggerEvent::new(summary.clone(), json!({ "n": n })))
            }
            None => PollOutcome::quiet(new_state),
        })
    }

    fn filter(&self, event: &TriggerEvent, task_config: &Value) -> bool {
        match task_config.get("keyword").and_then(Value::as_str) {
            Some(keyword) => event.summary.as_deref().is_some_and(|s| s.contains(keyword)),
            None => true,
        }
    }
}

/// Subscribe handler that keeps the sink so tests can push events.
#[derive(Default)]
pub struct CapturingSubscriber {
    sink: Mutex<Option<EventSink>>,
    /// Delivered from inside `subscribe`, before it returns.
    greeting: Mutex<Option<TriggerEvent>>,
    pub subscribes: AtomicUsize,
    pub unsubscribes: Arc<AtomicUsize>,
}

impl CapturingSubscriber {
    pub fn with_greeting(self, event: TriggerEvent) -> Self {
        *self.greeting.lock().unwrap_or_else(PoisonError::into_inner) = Some(event);
        self
    }

    pub fn emit(&self, event: TriggerEvent) -> bool {
        let sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match sink {
            Some(sink) => {
                sink(event);
                true
            }
            None => false,
        }
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TriggerHandler for CapturingSubscriber {
    async fn subscribe(&self, _config: &Value, sink: EventSink) -> DomainResult<Unsubscribe> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink.clone());
        let greeting = self.greeting.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(event) = greeting {
            sink(event);
            // Give the delivered event a chance to be handled before returning.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let unsubscribes = Arc::clone(&self.unsubscribes);
        Ok(Box::new(move || {
            unsubscribes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }
}

/// A module built from explicit triggers.
pub struct FakeModule {
    id: String,
    triggers: Vec<(String, TriggerSpec, Arc<dyn TriggerHandler>)>,
}

impl FakeModule {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            triggers: Vec::new(),
        }
    }

    pub fn with_trigger(
        mut self,
        local_id: &str,
        spec: TriggerSpec,
        handler: Arc<dyn TriggerHandler>,
    ) -> Self {
        self.triggers.push((local_id.to_string(), spec, handler));
        self
    }
}

impl TriggerModule for FakeModule {
    fn id(&self) -> &str {
        &self.id
    }

    fn triggers(&self) -> Vec<ModuleTrigger> {
        self.triggers
            .iter()
            .map(|(local, spec, handler)| {
                ModuleTrigger::new(local.clone(), spec.clone(), Arc::clone(handler))
            })
            .collect()
    }
}

/// Engine over in-memory stores with a scripted provider.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub provider: Arc<MockProvider>,
    pub bus: Arc<EventBus>,
    pub registry: Arc<TriggerRegistry>,
    pub engine: Arc<Engine>,
    pub service: TaskService,
}

impl Harness {
    pub fn new(provider: MockProvider) -> Self {
        Self::build(Arc::new(provider), Vec::new(), Config::default(), None, 0)
    }

    /// Like [`new`](Self::new) but the first `failures` run inserts fail.
    pub fn with_failing_run_inserts(provider: MockProvider, failures: usize) -> Self {
        Self::build(Arc::new(provider), Vec::new(), Config::default(), None, failures)
    }

    pub fn with_modules(
        provider: MockProvider,
        modules: Vec<Arc<dyn TriggerModule>>,
        config: Config,
    ) -> Self {
        Self::build(Arc::new(provider), modules, config, None, 0)
    }

    /// Like [`new`](Self::new) but resolving models through `models`.
    pub fn with_resolver(models: ConfiguredModelResolver) -> Self {
        Self::build(
            Arc::new(MockProvider::default()),
            Vec::new(),
            Config::default(),
            Some(models),
            0,
        )
    }

    fn build(
        provider: Arc<MockProvider>,
        modules: Vec<Arc<dyn TriggerModule>>,
        config: Config,
        models: Option<ConfiguredModelResolver>,
        failing_run_inserts: usize,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(EventBus::default());
        let registry = Arc::new(TriggerRegistry::from_modules(&modules));
        let models = models.unwrap_or_else(|| ConfiguredModelResolver::fixed(provider.clone()));

        let deps = EngineDeps {
            tasks: store.clone(),
            runs: Arc::new(FlakyRuns::new(store.clone(), failing_run_inserts)),
            states: store.clone(),
            modules: store.clone(),
            inbox: store.clone(),
            notifier: bus.clone(),
            models: Arc::new(models),
            tools: Arc::new(ToolRegistry::with_builtins()),
            persona: Arc::new(StaticPersona),
            costs: Some(Arc::new(PricingTable)),
            registry: Arc::clone(&registry),
        };
        let engine = Arc::new(Engine::new(deps, &config));
        let service = TaskService::new(store.clone(), store.clone(), Arc::clone(&registry))
            .with_engine(Arc::clone(&engine));

        Self {
            store,
            provider,
            bus,
            registry,
            engine,
            service,
        }
    }

    /// Create through the task service so the engine is notified.
    pub async fn create(&self, task: Task) -> Task {
        self.service.create_task(task).await.expect("task should be valid")
    }
}

/// Config with a short initial poll delay and cooldown, for timer tests.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.triggers.initial_poll_delay_secs = 1;
    config.triggers.default_cooldown_secs = 60;
    config
}

/// Run store whose first `failures` inserts fail, as if the database were down.
pub struct FlakyRuns {
    inner: Arc<MemoryStore>,
    failures: AtomicUsize,
}

impl FlakyRuns {
    pub fn new(inner: Arc<MemoryStore>, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl TaskRunRepository for FlakyRuns {
    async fn create(&self, run: &TaskRun) -> DomainResult<()> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(DomainError::DatabaseError("database is locked".to_string()));
        }
        TaskRunRepository::create(self.inner.as_ref(), run).await
    }

    async fn update(&self, run: &TaskRun) -> DomainResult<()> {
        TaskRunRepository::update(self.inner.as_ref(), run).await
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<TaskRun>> {
        TaskRunRepository::get(self.inner.as_ref(), id).await
    }

    async fn list_for_task(&self, task_id: Uuid, limit: usize) -> DomainResult<Vec<TaskRun>> {
        TaskRunRepository::list_for_task(self.inner.as_ref(), task_id, limit).await
    }
}
