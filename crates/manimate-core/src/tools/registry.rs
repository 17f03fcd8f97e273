//! Tool registry view over a live session
//!
//! The registry holds no state of its own beyond what the session's last
//! `list_tools()` returned. Descriptors are stamped with the session
//! generation that produced them so stale sets can be detected.

use async_trait::async_trait;
use serde_json::Value;

use crate::ai::types::AiTool;
use crate::error::Result;
use crate::mcp::protocol::McpToolDef;
use crate::mcp::McpSession;

/// Immutable description of one callable tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    /// Session generation this descriptor was discovered in
    pub generation: u64,
}

impl ToolDescriptor {
    pub fn from_mcp(def: McpToolDef, generation: u64) -> Self {
        Self {
            name: def.name,
            description: def.description.unwrap_or_else(|| "MCP tool".to_string()),
            input_schema: def.input_schema,
            generation,
        }
    }

    /// Tool definition in the shape the model API expects
    pub fn to_ai_tool(&self) -> AiTool {
        AiTool {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// Capability to invoke a tool by name.
///
/// The agent depends only on this; `McpSession` is the production
/// implementation.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Generation of the live session; changes every time it is reopened
    fn generation(&self) -> u64;

    /// Invoke a tool and return its textual result
    async fn invoke(&self, name: &str, arguments: Value) -> Result<String>;
}

/// The tools one session generation advertises, in server order
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    generation: u64,
}

impl ToolRegistry {
    /// Fetch a fresh listing from the session
    pub async fn from_session(session: &mut McpSession) -> Result<Self> {
        let tools = session.list_tools().await?;
        Ok(Self {
            tools,
            generation: session.generation(),
        })
    }

    pub fn new(tools: Vec<ToolDescriptor>, generation: u64) -> Self {
        Self { tools, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn ai_tools(&self) -> Vec<AiTool> {
        self.tools.iter().map(ToolDescriptor::to_ai_tool).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(name: &str, description: Option<&str>) -> McpToolDef {
        McpToolDef {
            name: name.to_string(),
            description: description.map(str::to_string),
            input_schema: json!({"type": "object", "properties": {"code": {"type": "string"}}}),
        }
    }

    #[test]
    fn test_descriptor_defaults_description() {
        let tool = ToolDescriptor::from_mcp(def("render_scene", None), 3);
        assert_eq!(tool.description, "MCP tool");
        assert_eq!(tool.generation, 3);
    }

    #[test]
    fn test_ai_tools_pass_through_unchanged() {
        let registry = ToolRegistry::new(
            vec![
                ToolDescriptor::from_mcp(def("render_scene", Some("Render a scene")), 1),
                ToolDescriptor::from_mcp(def("list_outputs", Some("List files")), 1),
            ],
            1,
        );

        let ai_tools = registry.ai_tools();
        assert_eq!(ai_tools.len(), 2);
        assert_eq!(ai_tools[0].name, "render_scene");
        assert_eq!(ai_tools[0].description, "Render a scene");
        assert_eq!(ai_tools[0].input_schema["properties"]["code"]["type"], "string");
        assert_eq!(registry.names(), vec!["render_scene", "list_outputs"]);
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
    }
}
