//! Configuration loading with figment.
//!
//! Defaults, then `.cadence/config.yaml` and `.cadence/local.yaml`, then
//! `CADENCE_` environment variables. The merged result is validated.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
