//! Application configuration
//!
//! Loaded from TOML: `$MANIMATE_CONFIG`, else `manimate.toml` in the
//! application directory, else `~/.manimate/config.toml`, else defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::agent::prompt::DEFAULT_SYSTEM_PROMPT;
use crate::ai::providers::ProviderId;
use crate::ai::AiClientConfig;
use crate::constants::{ai, app, server};
use crate::mcp::config::expand_env_var;
use crate::mcp::{LaunchSpec, SessionTimeouts};
use crate::paths;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub agent: AgentSettings,
    /// Where renders land, relative to the application directory
    pub output_dir: PathBuf,
}

/// `[server]`: how to launch the tool server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub command: String,
    pub args: Vec<String>,
    /// Values may reference `${VAR}`
    pub env: HashMap<String, String>,
    pub handshake_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
}

/// `[agent]`: model and behaviour
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentSettings {
    pub provider: ProviderId,
    /// Provider default when unset
    pub model: Option<String>,
    /// Replaces the built-in prompt
    pub system_prompt: Option<String>,
    /// `false` sends no system prompt at all
    pub use_system_prompt: bool,
    pub max_tokens: usize,
    pub max_tool_rounds: usize,
    pub base_url: Option<String>,
    /// Env var holding the API key, instead of the provider's default
    pub api_key_env: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            agent: AgentSettings::default(),
            output_dir: PathBuf::from(app::DEFAULT_OUTPUT_DIR),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            command: server::DEFAULT_COMMAND.to_string(),
            args: vec!["run".to_string(), server::DEFAULT_SCRIPT.to_string()],
            env: HashMap::new(),
            handshake_timeout_secs: server::HANDSHAKE_TIMEOUT_SECS,
            request_timeout_secs: server::REQUEST_TIMEOUT_SECS,
            shutdown_timeout_secs: server::SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            provider: ProviderId::default(),
            model: None,
            system_prompt: None,
            use_system_prompt: true,
            max_tokens: ai::MAX_OUTPUT_TOKENS,
            max_tool_rounds: ai::MAX_TOOL_ROUNDS,
            base_url: None,
            api_key_env: None,
        }
    }
}

impl AppConfig {
    /// Load from the first config file found, then apply env overrides
    pub fn load(app_dir: &Path) -> Result<(Self, Option<PathBuf>)> {
        let source = Self::locate(app_dir, |k| std::env::var(k).ok());

        let mut config = match &source {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {:?}", path))?;
                let config = Self::from_toml_str(&content)
                    .with_context(|| format!("Failed to parse {:?}", path))?;
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            None => {
                tracing::debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_overrides(|k| std::env::var(k).ok())?;
        Ok((config, source))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// First existing config file, by precedence
    fn locate(app_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
        if let Some(explicit) = env("MANIMATE_CONFIG").filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(explicit));
        }

        [
            app_dir.join(app::LOCAL_CONFIG_FILE),
            paths::config_dir().join(app::USER_CONFIG_FILE),
        ]
        .into_iter()
        .find(|p| p.is_file())
    }

    /// Apply `MANIMATE_PROVIDER` and `MANIMATE_MODEL`
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(provider) = env("MANIMATE_PROVIDER").filter(|v| !v.is_empty()) {
            self.agent.provider = provider
                .parse()
                .map_err(|e: String| anyhow::anyhow!("MANIMATE_PROVIDER: {}", e))?;
        }
        if let Some(model) = env("MANIMATE_MODEL").filter(|v| !v.is_empty()) {
            self.agent.model = Some(model);
        }
        Ok(())
    }

    /// Launch spec for the tool server, rooted at `app_dir`
    pub fn launch_spec(&self, app_dir: &Path) -> LaunchSpec {
        let env = self
            .server
            .env
            .iter()
            .map(|(k, v)| (k.clone(), expand_env_var(v)))
            .collect();
        LaunchSpec::new(
            self.server.command.clone(),
            self.server.args.clone(),
            app_dir.to_path_buf(),
        )
        .with_env(env)
    }

    pub fn timeouts(&self) -> SessionTimeouts {
        SessionTimeouts {
            handshake: Duration::from_secs(self.server.handshake_timeout_secs),
            request: Duration::from_secs(self.server.request_timeout_secs),
            shutdown: Duration::from_secs(self.server.shutdown_timeout_secs),
        }
    }

    pub fn output_dir(&self, app_dir: &Path) -> PathBuf {
        paths::resolve(app_dir, &self.output_dir)
    }

    /// Model to use: configured, else the provider default
    pub fn model(&self) -> String {
        self.agent
            .model
            .clone()
            .unwrap_or_else(|| self.agent.provider.default_model().to_string())
    }

    /// Client settings for the configured provider
    pub fn ai_client_config(&self) -> AiClientConfig {
        let mut config = AiClientConfig::for_provider(self.agent.provider);
        config.base_url = self.agent.base_url.clone();
        config
    }

    /// The behavioural prompt, if any
    pub fn system_prompt(&self) -> Option<String> {
        if !self.agent.use_system_prompt {
            return None;
        }
        Some(
            self.agent
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        )
    }
}
