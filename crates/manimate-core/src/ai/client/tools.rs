//! Tool-calling API calls
//!
//! Non-streaming calls with tool support, used by the agent loop.

use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use super::core::AiClient;
use crate::ai::backend::ModelBackend;
use crate::ai::format::{anthropic, openai};
use crate::ai::retry::with_retry;
use crate::ai::types::{ModelReply, ModelRequest};

impl AiClient {
    /// Call the API with tools, retrying transient failures
    pub async fn call_with_tools(&self, request: &ModelRequest) -> Result<ModelReply> {
        let body = if self.config().uses_openai_format() {
            openai::build_request_body(request)
        } else {
            anthropic::build_request_body(request)
        };

        let json = with_retry(&self.config().retry, || self.post_json(&request.model, &body)).await?;

        if self.config().uses_openai_format() {
            openai::parse_response(&json)
        } else {
            anthropic::parse_response(&json)
        }
    }

    async fn post_json(&self, model: &str, body: &Value) -> Result<Value> {
        info!(model = model, provider = %self.provider_id(), "API call starting");
        let start = Instant::now();

        let request = self.build_request(&self.config().api_url());
        let response = match request.json(body).send().await {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, elapsed_ms = start.elapsed().as_millis() as u64, "API request failed");
                return Err(e.into());
            }
        };

        let status = response.status();
        info!(status = %status, elapsed_ms = start.elapsed().as_millis() as u64, "API response received");

        let response = self.handle_error_response(response).await?;
        let json: Value = response.json().await?;
        Ok(json)
    }
}

#[async_trait]
impl ModelBackend for AiClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply> {
        self.call_with_tools(request).await
    }
}
