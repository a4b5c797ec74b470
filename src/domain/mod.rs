//! Domain layer for the Cadence orchestration engine
//!
//! Core models, the error taxonomy and the port traits adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
