//! Core HTTP plumbing shared by all calls

use anyhow::Result;
use reqwest::{RequestBuilder, Response};

use super::config::AiClientConfig;
use crate::ai::providers::{AuthHeader, ProviderId};
use crate::ai::retry::ApiStatusError;
use crate::constants;

/// Longest error body we keep in error messages
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Client for one provider and API key
pub struct AiClient {
    http: reqwest::Client,
    config: AiClientConfig,
    api_key: String,
}

impl AiClient {
    pub fn new(config: AiClientConfig, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            api_key,
        }
    }

    pub fn config(&self) -> &AiClientConfig {
        &self.config
    }

    pub fn provider_id(&self) -> ProviderId {
        self.config.provider_id
    }

    /// POST request with auth and provider headers applied
    pub(crate) fn build_request(&self, url: &str) -> RequestBuilder {
        let mut request = self
            .http
            .post(url)
            .header("content-type", "application/json");

        request = match self.config.auth_header {
            AuthHeader::XApiKey => request.header("x-api-key", &self.api_key),
            AuthHeader::Bearer => request.bearer_auth(&self.api_key),
        };

        if !self.config.uses_openai_format() {
            request = request.header("anthropic-version", constants::ai::ANTHROPIC_VERSION);
        }

        request
    }

    /// Turn non-success statuses into `ApiStatusError`
    pub(crate) async fn handle_error_response(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let body = if body.chars().count() > MAX_ERROR_BODY_CHARS {
            format!("{}...", body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>())
        } else {
            body
        };

        tracing::warn!(status = status.as_u16(), provider = %self.provider_id(), "API error response");
        Err(ApiStatusError {
            status: status.as_u16(),
            body,
        }
        .into())
    }
}
