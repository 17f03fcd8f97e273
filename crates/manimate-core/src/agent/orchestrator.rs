//! One conversation turn: model calls interleaved with sequential tool calls

use std::fmt;
use std::sync::Arc;

use crate::ai::types::{AiToolCall, Content, ModelMessage, Role};
use crate::ai::ModelBackend;
use crate::error::{Error, Result};
use crate::tools::ToolInvoker;

use super::config::AgentConfig;

/// A tool call that failed during a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    pub tool: String,
    pub detail: String,
}

/// Final answer for one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub text: String,
    pub tool_failures: Vec<ToolFailure>,
}

impl fmt::Display for AgentReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)?;
        for (i, failure) in self.tool_failures.iter().enumerate() {
            if i > 0 || !self.text.is_empty() {
                writeln!(f)?;
            }
            write!(f, "[tool {} failed: {}]", failure.tool, failure.detail)?;
        }
        Ok(())
    }
}

/// Language-model-backed agent bound to one session's tools.
///
/// Conversation history is kept across turns.
pub struct Agent<'a> {
    config: AgentConfig,
    model: Arc<dyn ModelBackend>,
    tools: &'a dyn ToolInvoker,
    history: Vec<ModelMessage>,
}

impl<'a> Agent<'a> {
    pub fn new(config: AgentConfig, model: Arc<dyn ModelBackend>, tools: &'a dyn ToolInvoker) -> Self {
        Self {
            config,
            model,
            tools,
            history: Vec::new(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn history(&self) -> &[ModelMessage] {
        &self.history
    }

    /// Answer one utterance, invoking tools as the model asks.
    ///
    /// Tool failures are reported to the model and listed in the reply.
    /// Any other failure rolls the turn back out of the history.
    pub async fn respond(&mut self, utterance: &str) -> Result<AgentReply> {
        let live = self.tools.generation();
        if live != self.config.generation {
            return Err(Error::agent(format!(
                "tool configuration is stale (built for session generation {}, live session is {}); rebuild the agent",
                self.config.generation, live
            )));
        }

        let checkpoint = self.history.len();
        self.history.push(ModelMessage::user_text(utterance));

        match self.run_turn().await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Turn failed, rolling back history");
                self.history.truncate(checkpoint);
                Err(e)
            }
        }
    }

    async fn run_turn(&mut self) -> Result<AgentReply> {
        let mut failures = Vec::new();

        for round in 1..=self.config.max_tool_rounds {
            let request = self.config.request(self.history.clone());
            let reply = self
                .model
                .complete(&request)
                .await
                .map_err(|e| Error::agent(format!("{:#}", e)))?;

            tracing::debug!(
                round,
                finish_reason = ?reply.finish_reason,
                prompt_tokens = reply.usage.prompt_tokens,
                completion_tokens = reply.usage.completion_tokens,
                "Model replied"
            );

            let calls = reply.tool_calls();
            if !reply.content.is_empty() {
                self.history.push(ModelMessage {
                    role: Role::Assistant,
                    content: reply.content.clone(),
                });
            }

            if calls.is_empty() {
                return Ok(AgentReply {
                    text: reply.text(),
                    tool_failures: failures,
                });
            }

            let results = self.execute_tools(&calls, &mut failures).await?;
            self.history.push(ModelMessage {
                role: Role::User,
                content: results,
            });
        }

        Err(Error::agent(format!(
            "model was still requesting tools after {} rounds",
            self.config.max_tool_rounds
        )))
    }

    /// Run tool calls in order. Only tool failures are absorbed.
    async fn execute_tools(
        &self,
        calls: &[AiToolCall],
        failures: &mut Vec<ToolFailure>,
    ) -> Result<Vec<Content>> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            tracing::info!(tool = %call.name, id = %call.id, "Invoking tool");
            match self.tools.invoke(&call.name, call.arguments.clone()).await {
                Ok(output) => results.push(Content::ToolResult {
                    tool_use_id: call.id.clone(),
                    output,
                    is_error: None,
                }),
                Err(e) if e.is_tool_failure() => {
                    tracing::warn!(tool = %call.name, kind = e.kind(), error = %e, "Tool failed");
                    let detail = failure_detail(&e);
                    results.push(Content::ToolResult {
                        tool_use_id: call.id.clone(),
                        output: detail.clone(),
                        is_error: Some(true),
                    });
                    failures.push(ToolFailure {
                        tool: call.name.clone(),
                        detail,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(results)
    }
}

fn failure_detail(error: &Error) -> String {
    match error {
        Error::ToolExecution { detail, .. } => detail.clone(),
        other => other.to_string(),
    }
}
