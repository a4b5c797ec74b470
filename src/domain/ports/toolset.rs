//! Tool-set port: callable tools plus the prompt text they contribute.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::DomainResult;

/// A tool the model may call during a run.
#[async_trait]
pub trait Tool: Send + Sync {
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the input object.
    fn input_schema(&self) -> Value;

    /// Extra system-prompt text shown when the tool is available.
    fn prompt_fragment(&self) -> Option<String> {
        None
    }

    async fn call(&self, input: Value) -> DomainResult<Value>;
}

/// An already filtered set of tools for one run.
#[derive(Clone, Default)]
pub struct ToolSet {
    pub tools: Vec<Arc<dyn Tool>>,
    pub prompt_fragments: Vec<String>,
}

impl ToolSet {
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.id() == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.id()).collect()
    }
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.ids())
            .field("prompt_fragments", &self.prompt_fragments.len())
            .finish()
    }
}

#[async_trait]
pub trait ToolSetBuilder: Send + Sync {
    /// `allowed = None` means every enabled tool.
    async fn build_tool_set(&self, allowed: Option<&[String]>) -> DomainResult<ToolSet>;
}
