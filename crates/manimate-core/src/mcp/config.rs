//! Launch configuration for the local tool server

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::server;

/// How to start the tool server process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub command: String,
    pub args: Vec<String>,
    /// Extra environment for the child, already expanded
    pub env: HashMap<String, String>,
    /// The child's working directory; relative args resolve against it
    pub working_dir: PathBuf,
}

impl LaunchSpec {
    pub fn new(command: impl Into<String>, args: Vec<String>, working_dir: PathBuf) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            working_dir,
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

impl fmt::Display for LaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Bounds applied to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// Spawn + initialize handshake
    pub handshake: Duration,
    /// Any single request after the handshake, tool calls included
    pub request: Duration,
    /// Grace period between closing stdin and killing the child
    pub shutdown: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(server::HANDSHAKE_TIMEOUT_SECS),
            request: Duration::from_secs(server::REQUEST_TIMEOUT_SECS),
            shutdown: Duration::from_secs(server::SHUTDOWN_TIMEOUT_SECS),
        }
    }
}

/// Expand ${VAR} references from the process environment.
///
/// Unset variables expand to the empty string.
pub fn expand_env_var(s: &str) -> String {
    let mut result = s.to_string();
    let mut search_from = 0;

    while let Some(rel_start) = result[search_from..].find("${") {
        let start = search_from + rel_start;
        let Some(end_offset) = result[start..].find('}') else {
            break;
        };
        let end = start + end_offset;
        let var_name = &result[start + 2..end];

        let value = match std::env::var(var_name) {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("Environment variable {} is not set", var_name);
                String::new()
            }
        };

        result.replace_range(start..end + 1, &value);
        search_from = start + value.len();
    }

    result
}
