//! Messages and tool definitions exchanged with the model
//!
//! Shaped like Anthropic content blocks; the OpenAI format converts to and
//! from these at the wire boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Content blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        output: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Unified message format for provider communication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: Role,
    pub content: Vec<Content>,
}

impl ModelMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![Content::Text { text: text.into() }],
        }
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    Other(String),
}

impl FinishReason {
    /// Map provider stop reasons (Anthropic and OpenAI spellings)
    pub fn from_provider(reason: Option<&str>) -> Self {
        match reason {
            Some("end_turn") | Some("stop") | Some("stop_sequence") | None => FinishReason::Stop,
            Some("max_tokens") | Some("length") => FinishReason::Length,
            Some("tool_use") | Some("tool_calls") => FinishReason::ToolCalls,
            Some(other) => FinishReason::Other(other.to_string()),
        }
    }
}

/// Token usage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// One model call's input
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<AiTool>,
    pub max_tokens: usize,
}

/// One model call's output
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    pub content: Vec<Content>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl ModelReply {
    /// Concatenated text blocks
    pub fn text(&self) -> String {
        let mut text = String::new();
        for block in &self.content {
            if let Content::Text { text: chunk } = block {
                if !text.is_empty() && !chunk.is_empty() {
                    text.push('\n');
                }
                text.push_str(chunk);
            }
        }
        text.trim().to_string()
    }

    /// Tool calls requested in this reply, in order
    pub fn tool_calls(&self) -> Vec<AiToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                Content::ToolUse { id, name, input } => Some(AiToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}
