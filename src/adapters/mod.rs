//! Adapters implementing the domain ports.

pub mod llm;
pub mod memory;
pub mod persona;
pub mod sqlite;
pub mod tools;
pub mod triggers;
