//! OpenAI Chat Completions format
//!
//! Converts our Anthropic-shaped messages to chat completions and normalizes
//! the response back, so the agent sees one format.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use tracing::warn;

use super::anthropic::excerpt;
use crate::ai::types::{AiTool, Content, FinishReason, ModelMessage, ModelReply, ModelRequest, Role, Usage};

/// Build the JSON body for a chat completions call
pub fn build_request_body(request: &ModelRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "max_tokens": request.max_tokens,
        "messages": convert_messages(request.system_prompt.as_deref(), &request.messages),
    });

    if !request.tools.is_empty() {
        body["tools"] = json!(convert_tools(&request.tools));
    }

    body
}

pub fn convert_messages(system_prompt: Option<&str>, messages: &[ModelMessage]) -> Vec<Value> {
    let mut result = Vec::new();

    if let Some(system) = system_prompt {
        result.push(json!({"role": "system", "content": system}));
    }

    for msg in messages {
        match msg.role {
            Role::Assistant => {
                let mut text = String::new();
                let mut tool_calls = Vec::new();
                for block in &msg.content {
                    match block {
                        Content::Text { text: chunk } => text.push_str(chunk),
                        Content::ToolUse { id, name, input } => tool_calls.push(json!({
                            "id": id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": input.to_string()
                            }
                        })),
                        Content::ToolResult { .. } => {}
                    }
                }

                let mut obj = json!({"role": "assistant"});
                obj["content"] = if text.is_empty() { Value::Null } else { json!(text) };
                if !tool_calls.is_empty() {
                    obj["tool_calls"] = json!(tool_calls);
                }
                result.push(obj);
            }
            Role::User => {
                for block in &msg.content {
                    match block {
                        Content::Text { text } => {
                            result.push(json!({"role": "user", "content": text}));
                        }
                        Content::ToolResult {
                            tool_use_id,
                            output,
                            ..
                        } => {
                            result.push(json!({
                                "role": "tool",
                                "tool_call_id": tool_use_id,
                                "content": output
                            }));
                        }
                        Content::ToolUse { .. } => {}
                    }
                }
            }
        }
    }

    result
}

pub fn convert_tools(tools: &[AiTool]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema
                }
            })
        })
        .collect()
}

/// Normalize a chat completions response into our reply shape
pub fn parse_response(json: &Value) -> Result<ModelReply> {
    let choice = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| anyhow!("response has no choices: {}", excerpt(json)))?;
    let message = choice
        .get("message")
        .ok_or_else(|| anyhow!("choice has no message"))?;

    let mut content = Vec::new();
    if let Some(text) = message.get("content").and_then(|c| c.as_str()) {
        if !text.is_empty() {
            content.push(Content::Text {
                text: text.to_string(),
            });
        }
    }

    if let Some(calls) = message.get("tool_calls").and_then(|c| c.as_array()) {
        for call in calls {
            let id = call.get("id").and_then(|i| i.as_str()).unwrap_or_default();
            let function = call.get("function");
            let name = function
                .and_then(|f| f.get("name"))
                .and_then(|n| n.as_str())
                .ok_or_else(|| anyhow!("tool call without function name"))?;
            let raw_args = function
                .and_then(|f| f.get("arguments"))
                .and_then(|a| a.as_str())
                .unwrap_or("{}");
            let input = serde_json::from_str(raw_args).unwrap_or_else(|e| {
                warn!(tool = name, error = %e, "Model sent unparseable tool arguments");
                json!({})
            });
            content.push(Content::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            });
        }
    }

    let usage = json
        .get("usage")
        .map(|u| Usage {
            prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
            completion_tokens: u
                .get("completion_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize,
        })
        .unwrap_or_default();

    Ok(ModelReply {
        content,
        finish_reason: FinishReason::from_provider(
            choice.get("finish_reason").and_then(|f| f.as_str()),
        ),
        usage,
    })
}
