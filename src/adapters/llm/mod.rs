//! Model provider adapters.

pub mod anthropic;
pub mod mock;
pub mod resolver;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use mock::{MockProvider, MOCK_MODEL};
pub use resolver::{ConfiguredModelResolver, KNOWN_PROVIDERS};
