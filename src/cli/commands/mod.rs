//! CLI command implementations.

pub mod inbox;
pub mod init;
pub mod module;
pub mod run;
pub mod task;
pub mod trigger;
