use crate::ai::types::{AiTool, ModelMessage, ModelRequest};
use crate::constants::ai;
use crate::tools::ToolRegistry;

/// Everything the agent is configured with.
///
/// Built once from a `ToolRegistry` and bound to that registry's session
/// generation. A reopened session needs a new config.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub tools: Vec<AiTool>,
    pub system_prompt: Option<String>,
    pub model: String,
    pub max_tool_rounds: usize,
    pub max_tokens: usize,
    pub generation: u64,
}

impl AgentConfig {
    pub fn new(
        registry: &ToolRegistry,
        model: impl Into<String>,
        system_prompt: Option<String>,
    ) -> Self {
        Self {
            tools: registry.ai_tools(),
            system_prompt,
            model: model.into(),
            max_tool_rounds: ai::MAX_TOOL_ROUNDS,
            max_tokens: ai::MAX_OUTPUT_TOKENS,
            generation: registry.generation(),
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub(crate) fn request(&self, messages: Vec<ModelMessage>) -> ModelRequest {
        ModelRequest {
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            messages,
            tools: self.tools.clone(),
            max_tokens: self.max_tokens,
        }
    }
}
