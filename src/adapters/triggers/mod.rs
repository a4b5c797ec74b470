//! Built-in trigger modules.

pub mod run_events;
pub mod web_watch;

use std::sync::Arc;

use crate::domain::ports::TriggerModule;
use crate::services::event_bus::EventBus;

pub use run_events::RunEventsModule;
pub use web_watch::WebModule;

/// Every module shipped with the engine.
pub fn builtin_modules(bus: &Arc<EventBus>) -> Vec<Arc<dyn TriggerModule>> {
    vec![
        Arc::new(WebModule::new()),
        Arc::new(RunEventsModule::new(Arc::clone(bus))),
    ]
}
