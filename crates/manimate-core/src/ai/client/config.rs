//! AI Client configuration
//!
//! Where and how to reach a provider. The model and token limit travel
//! with each `ModelRequest`.

use crate::ai::providers::{ApiFormat, AuthHeader, ProviderId};
use crate::ai::retry::RetryConfig;

/// Configuration for the AI client
#[derive(Debug, Clone)]
pub struct AiClientConfig {
    /// Optional base URL override (defaults to provider default)
    pub base_url: Option<String>,
    /// How to send authentication header
    pub auth_header: AuthHeader,
    /// Which provider this config is for
    pub provider_id: ProviderId,
    pub api_format: ApiFormat,
    pub retry: RetryConfig,
}

impl AiClientConfig {
    /// Defaults for a provider
    pub fn for_provider(provider_id: ProviderId) -> Self {
        Self {
            base_url: None,
            auth_header: provider_id.auth_header(),
            provider_id,
            api_format: provider_id.api_format(),
            retry: RetryConfig::default(),
        }
    }

    /// Get the API URL to use
    pub fn api_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider_id.api_url().to_string())
    }

    /// Check if this config uses OpenAI chat/completions format
    pub fn uses_openai_format(&self) -> bool {
        matches!(self.api_format, ApiFormat::OpenAI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_provider() {
        let config = AiClientConfig::for_provider(ProviderId::OpenRouter);
        assert_eq!(config.api_url(), ProviderId::OpenRouter.api_url());
        assert!(config.uses_openai_format());
        assert_eq!(config.auth_header, AuthHeader::Bearer);
    }

    #[test]
    fn test_base_url_override() {
        let mut config = AiClientConfig::for_provider(ProviderId::Anthropic);
        config.base_url = Some("http://localhost:8080/v1/messages".to_string());
        assert_eq!(config.auth_header, AuthHeader::XApiKey);
        assert_eq!(config.api_url(), "http://localhost:8080/v1/messages");
        assert!(!config.uses_openai_format());
    }
}
