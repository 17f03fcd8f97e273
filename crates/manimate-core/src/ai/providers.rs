//! AI provider configuration
//!
//! Built-in providers and how to reach them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire format spoken by a provider endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    /// Anthropic Messages API
    Anthropic,
    /// OpenAI Chat Completions API
    OpenAI,
}

/// How to send the API key in requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthHeader {
    /// Use `x-api-key: <key>` header (Anthropic style)
    #[default]
    XApiKey,
    /// Use `Authorization: Bearer <key>` header (OpenAI style)
    Bearer,
}

/// Unique identifier for each supported provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "openrouter")]
    OpenRouter,
}

impl ProviderId {
    pub fn all() -> &'static [ProviderId] {
        &[ProviderId::Anthropic, ProviderId::OpenAI, ProviderId::OpenRouter]
    }

    /// Key used in credentials.json
    pub fn storage_key(&self) -> &'static str {
        match self {
            ProviderId::Anthropic => "anthropic",
            ProviderId::OpenAI => "openai",
            ProviderId::OpenRouter => "openrouter",
        }
    }

    /// Environment variable that holds the API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderId::Anthropic => "ANTHROPIC_API_KEY",
            ProviderId::OpenAI => "OPENAI_API_KEY",
            ProviderId::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderId::Anthropic => "claude-sonnet-4-20250514",
            ProviderId::OpenAI => "gpt-4.1",
            ProviderId::OpenRouter => "anthropic/claude-sonnet-4",
        }
    }

    pub fn api_url(&self) -> &'static str {
        match self {
            ProviderId::Anthropic => "https://api.anthropic.com/v1/messages",
            ProviderId::OpenAI => "https://api.openai.com/v1/chat/completions",
            ProviderId::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
        }
    }

    pub fn api_format(&self) -> ApiFormat {
        match self {
            ProviderId::Anthropic => ApiFormat::Anthropic,
            ProviderId::OpenAI | ProviderId::OpenRouter => ApiFormat::OpenAI,
        }
    }

    pub fn auth_header(&self) -> AuthHeader {
        match self {
            ProviderId::Anthropic => AuthHeader::XApiKey,
            ProviderId::OpenAI | ProviderId::OpenRouter => AuthHeader::Bearer,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderId::Anthropic => write!(f, "Anthropic"),
            ProviderId::OpenAI => write!(f, "OpenAI"),
            ProviderId::OpenRouter => write!(f, "OpenRouter"),
        }
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderId::Anthropic),
            "openai" => Ok(ProviderId::OpenAI),
            "openrouter" => Ok(ProviderId::OpenRouter),
            other => Err(format!(
                "unknown provider `{}` (expected anthropic, openai or openrouter)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        assert_eq!("Anthropic".parse::<ProviderId>(), Ok(ProviderId::Anthropic));
        assert_eq!("openrouter".parse::<ProviderId>(), Ok(ProviderId::OpenRouter));
        assert!("minimax".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_openai_compatible_providers_use_bearer() {
        for provider in [ProviderId::OpenAI, ProviderId::OpenRouter] {
            assert_eq!(provider.api_format(), ApiFormat::OpenAI);
            assert_eq!(provider.auth_header(), AuthHeader::Bearer);
        }
        assert_eq!(ProviderId::Anthropic.auth_header(), AuthHeader::XApiKey);
    }

    #[test]
    fn test_provider_serde_names() {
        let p: ProviderId = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(p, ProviderId::OpenAI);
        assert_eq!(serde_json::to_string(&ProviderId::Anthropic).unwrap(), "\"anthropic\"");
    }
}
