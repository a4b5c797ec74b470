//! Tool registry and built-in tools.
//!
//! The registry owns every known tool and hands the executor a filtered
//! [`ToolSet`] per run.

mod clock;

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::ports::{Tool, ToolSet, ToolSetBuilder};

pub use clock::CurrentTimeTool;

#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Arc<dyn Tool>>>,
    disabled: RwLock<HashSet<String>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.ids())
            .finish_non_exhaustive()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in tools.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(CurrentTimeTool));
        registry
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        let id = tool.id().to_string();
        self.tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tool);
    }

    pub fn disable(&self, id: &str) {
        self.disabled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string());
    }

    pub fn enable(&self, id: &str) {
        self.disabled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    pub fn ids(&self) -> Vec<String> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ToolSetBuilder for ToolRegistry {
    async fn build_tool_set(&self, allowed: Option<&[String]>) -> DomainResult<ToolSet> {
        let disabled = self.disabled.read().unwrap_or_else(PoisonError::into_inner);
        let tools: Vec<Arc<dyn Tool>> = self
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|t| !disabled.contains(t.id()))
            .filter(|t| allowed.map_or(true, |ids| ids.iter().any(|id| id == t.id())))
            .cloned()
            .collect();

        let prompt_fragments = tools.iter().filter_map(|t| t.prompt_fragment()).collect();
        Ok(ToolSet {
            tools,
            prompt_fragments,
        })
    }
}
