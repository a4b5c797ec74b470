//! Service layer: the dispatchers, the executor and the facade that wires
//! them together.

pub mod cost_tracker;
pub mod engine;
pub mod event_bus;
pub mod task_executor;
pub mod task_scheduler;
pub mod task_service;
pub mod trigger_poller;
pub mod trigger_registry;
pub mod trigger_subscriber;

pub use cost_tracker::PricingTable;
pub use engine::{Engine, EngineDeps, StartReport};
pub use event_bus::EventBus;
pub use task_executor::{ExecutionError, ExecutorPorts, TaskExecutor};
pub use task_scheduler::{parse_cron, ScheduleOutcome, SyncReport, TaskScheduler};
pub use task_service::TaskService;
pub use trigger_poller::{DispatchPorts, PollCycleOutcome, RefreshReport, TriggerPoller};
pub use trigger_registry::{full_trigger_id, RegisteredTrigger, TriggerRegistry};
pub use trigger_subscriber::TriggerSubscriber;
