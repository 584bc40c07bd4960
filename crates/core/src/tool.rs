//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! search the web, look up a forecast, resolve a city to coordinates.
//! Every tool takes a plain string and answers with a plain string.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::RunCancellationToken;
use crate::error::ToolError;

/// The core Tool trait.
///
/// Tools are registered in a [`ToolRegistry`] and invoked concurrently by the
/// dispatcher, so implementations must be `Send + Sync` and must not rely on
/// being called one at a time.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The name the model uses to pick this tool (e.g., "Bocha").
    fn name(&self) -> &str;

    /// What this tool does and what input it expects (rendered into the prompt).
    fn description(&self) -> &str;

    /// Run the tool.
    ///
    /// Long-running implementations should stop early once `cancel` fires;
    /// the dispatcher abandons the call either way.
    async fn call(&self, input: &str, cancel: &RunCancellationToken)
    -> Result<String, ToolError>;
}

/// The set of tools available to one executor.
///
/// Names are canonicalized to uppercase, so `"bocha"`, `"Bocha"` and
/// `"BOCHA"` resolve to the same tool. The registry is filled before a run
/// starts and shared read-only behind an `Arc` afterwards.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of tools.
    pub fn from_tools(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let key = canonical_name(tool.name());
        if self.tools.insert(key.clone(), tool).is_none() {
            self.order.push(key);
        }
    }

    /// Look a tool up by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(&canonical_name(name)).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.order.iter().filter_map(|key| self.tools.get(key))
    }

    /// Tool names as the tools spell them, comma separated.
    pub fn names(&self) -> String {
        self.iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// One `- name: description` line per tool.
    pub fn descriptions(&self) -> String {
        self.iter()
            .map(|t| format!("- {}: {}\n", t.name(), t.description().trim()))
            .collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

fn canonical_name(name: &str) -> String {
    name.trim().to_uppercase()
}
