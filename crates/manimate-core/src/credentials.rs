//! Multi-provider credential storage
//!
//! API keys for each provider, read from a JSON file. Used when the
//! provider's environment variable is not set.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::ai::providers::ProviderId;
use crate::paths;

/// Storage for API keys indexed by provider
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialStore {
    #[serde(flatten)]
    keys: HashMap<String, String>,
}

impl CredentialStore {
    /// Load credentials from ~/.manimate/tokens/credentials.json
    pub fn load() -> Result<Self> {
        Self::load_from_path(&paths::credentials_path())
    }

    /// Load credentials from a specific path. A missing file is an empty store.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        warn_if_shared(path);
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let store: CredentialStore = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(store)
    }

    /// Get API key for a provider
    pub fn get(&self, provider: &ProviderId) -> Option<&String> {
        self.keys.get(provider.storage_key())
    }
}

/// Keys should be readable by the owner only (0600)
#[cfg(unix)]
fn warn_if_shared(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = fs::metadata(path) {
        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            tracing::warn!(
                "Credentials file {:?} is accessible by other users (mode {:o}); chmod 600 it",
                path,
                mode & 0o777
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_if_shared(_path: &Path) {}

/// Resolve the API key: `env_override` or the provider's env var first, then the store
pub fn resolve_api_key(
    provider: ProviderId,
    env_override: Option<&str>,
    store: &CredentialStore,
) -> Option<String> {
    let env_name = env_override.unwrap_or(provider.api_key_env());
    match std::env::var(env_name) {
        Ok(key) if !key.trim().is_empty() => {
            tracing::debug!("Using API key from {}", env_name);
            Some(key.trim().to_string())
        }
        _ => store.get(&provider).cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_store() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CredentialStore::load_from_path(&tmp.path().join("nope.json")).unwrap();
        assert!(store.get(&ProviderId::Anthropic).is_none());
    }

    #[test]
    fn test_load_reads_provider_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("credentials.json");
        fs::write(&path, r#"{"openai": "sk-test", "unknown": "ignored"}"#).unwrap();

        let store = CredentialStore::load_from_path(&path).unwrap();
        assert_eq!(store.get(&ProviderId::OpenAI).map(String::as_str), Some("sk-test"));
        assert!(store.get(&ProviderId::Anthropic).is_none());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("credentials.json");
        fs::write(&path, "not json").unwrap();
        assert!(CredentialStore::load_from_path(&path).is_err());
    }

    #[test]
    fn test_resolve_prefers_env_override() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("credentials.json");
        fs::write(&path, r#"{"anthropic": "from-store"}"#).unwrap();
        let store = CredentialStore::load_from_path(&path).unwrap();

        std::env::set_var("MANIMATE_TEST_KEY_A", "from-env");
        assert_eq!(
            resolve_api_key(ProviderId::Anthropic, Some("MANIMATE_TEST_KEY_A"), &store).as_deref(),
            Some("from-env")
        );

        assert_eq!(
            resolve_api_key(ProviderId::Anthropic, Some("MANIMATE_TEST_KEY_UNSET"), &store)
                .as_deref(),
            Some("from-store")
        );
    }
}
