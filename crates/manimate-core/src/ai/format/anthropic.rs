//! Anthropic Messages API format
//!
//! Our content blocks already mirror this format, so conversion is mostly
//! a direct mapping.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use crate::ai::types::{AiTool, Content, FinishReason, ModelMessage, ModelReply, ModelRequest, Role, Usage};

/// Build the JSON body for a Messages API call
pub fn build_request_body(request: &ModelRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "max_tokens": request.max_tokens,
        "messages": convert_messages(&request.messages),
    });

    if let Some(system) = &request.system_prompt {
        body["system"] = json!(system);
    }

    if !request.tools.is_empty() {
        body["tools"] = json!(convert_tools(&request.tools));
    }

    body
}

pub fn convert_messages(messages: &[ModelMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            json!({
                "role": match msg.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                "content": msg.content.iter().map(convert_content).collect::<Vec<_>>(),
            })
        })
        .collect()
}

pub fn convert_tools(tools: &[AiTool]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema,
            })
        })
        .collect()
}

fn convert_content(content: &Content) -> Value {
    match content {
        Content::Text { text } => json!({
            "type": "text",
            "text": text
        }),
        Content::ToolUse { id, name, input } => json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input
        }),
        Content::ToolResult {
            tool_use_id,
            output,
            is_error,
        } => json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": output,
            "is_error": is_error.unwrap_or(false)
        }),
    }
}

/// Parse a Messages API response
pub fn parse_response(json: &Value) -> Result<ModelReply> {
    let blocks = json
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow!("response has no content array: {}", excerpt(json)))?;

    let mut content = Vec::new();
    for block in blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                let text = block.get("text").and_then(|t| t.as_str()).unwrap_or("");
                content.push(Content::Text {
                    text: text.to_string(),
                });
            }
            Some("tool_use") => {
                let id = block
                    .get("id")
                    .and_then(|i| i.as_str())
                    .ok_or_else(|| anyhow!("tool_use block without id"))?;
                let name = block
                    .get("name")
                    .and_then(|n| n.as_str())
                    .ok_or_else(|| anyhow!("tool_use block without name"))?;
                content.push(Content::ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: block.get("input").cloned().unwrap_or_else(|| json!({})),
                });
            }
            // Thinking and other provider-specific blocks carry nothing we replay
            _ => {}
        }
    }

    let usage = json
        .get("usage")
        .map(|u| Usage {
            prompt_tokens: u.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
            completion_tokens: u.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
        })
        .unwrap_or_default();

    Ok(ModelReply {
        content,
        finish_reason: FinishReason::from_provider(json.get("stop_reason").and_then(|s| s.as_str())),
        usage,
    })
}

pub(crate) fn excerpt(json: &Value) -> String {
    let s = json.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
