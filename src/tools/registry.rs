//! Name-to-tool lookup, fixed at construction.

use std::sync::Arc;

use super::builtin;
use super::tool::Tool;
use super::types::ToolDefinition;
use crate::config::ParleyConfig;
use crate::error::ToolError;

/// Immutable set of tools, shared across tasks behind an `Arc`.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder { tools: Vec::new() }
    }

    /// Registry with the built-in date/time tools, plus the web tools when enabled.
    pub fn builtin(config: &ParleyConfig) -> Self {
        #[cfg(feature = "web-tools")]
        let web = if config.web_tools_enabled {
            builtin::web::all_tools(&config.search_base_url, config.request_timeout)
        } else {
            Vec::new()
        };
        #[cfg(not(feature = "web-tools"))]
        let web: Vec<Arc<dyn Tool>> = Vec::new();

        Self::builder()
            .tools(builtin::datetime::all_tools(config.timezone()))
            .tools(web)
            .build()
    }

    /// Tool definitions in registration order.
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .cloned()
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    /// Register a tool. A later tool with the same name replaces the earlier
    /// one in its original position.
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => self.tools[index] = tool,
            None => self.tools.push(tool),
        }
        self
    }

    pub fn tools(self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        tools.into_iter().fold(self, |builder, tool| builder.tool(tool))
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry { tools: self.tools }
    }
}
