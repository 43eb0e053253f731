use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// A named capability the agent can invoke with a text payload.
///
/// Tools are expected to report bad input in-band (for example as an
/// `{"error": "..."}` payload) and reserve `Err` for genuine faults. The
/// executor turns either into an observation, so nothing a tool does can end
/// a run.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn call(&self, input: &str) -> Result<String>;
}

/// Static description of a tool that can be embedded in prompts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
}

/// Ordered name -> tool mapping.
///
/// Lookups go through a hash index; iteration follows registration order so
/// the catalog shown to the model is stable from turn to turn.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tool` under its name.
    ///
    /// Registering a name twice replaces the earlier tool (last write wins);
    /// the replacement keeps the catalog position of the original.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if name.trim().is_empty() {
            return Err(AgentError::Protocol("tool name must not be empty".into()));
        }
        match self.index.get(&name) {
            Some(&slot) => {
                tracing::debug!(tool = %name, "replacing previously registered tool");
                self.tools[slot] = tool;
            }
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
        Ok(())
    }

    /// Merges every tool of `other` into this registry, in order.
    pub fn extend(&mut self, other: ToolRegistry) -> Result<()> {
        for tool in other.tools {
            self.register_arc(tool)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&slot| self.tools[slot].clone())
    }

    pub fn list_all(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn describe(&self) -> Vec<ToolDescription> {
        self.tools
            .iter()
            .map(|tool| ToolDescription {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        name: &'static str,
        reply: &'static str,
    }

    #[async_trait]
    impl Tool for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Replies with a fixed string"
        }

        async fn call(&self, _input: &str) -> Result<String> {
            Ok(self.reply.to_string())
        }
    }

    #[test]
    fn lists_in_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Fixed { name: "zeta", reply: "" }).unwrap();
        registry.register(Fixed { name: "alpha", reply: "" }).unwrap();

        assert_eq!(registry.names(), vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let mut registry = ToolRegistry::new();
        registry.register(Fixed { name: "a", reply: "first" }).unwrap();
        registry.register(Fixed { name: "b", reply: "other" }).unwrap();
        registry.register(Fixed { name: "a", reply: "second" }).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["a", "b"]);
        let tool = registry.get("a").unwrap();
        assert_eq!(tool.call("").await.unwrap(), "second");
    }

    #[test]
    fn unknown_name_is_none() {
        let registry = ToolRegistry::new();
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn rejects_empty_names() {
        let mut registry = ToolRegistry::new();
        let err = registry.register(Fixed { name: "  ", reply: "" }).unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));
        assert!(registry.is_empty());
    }
}
