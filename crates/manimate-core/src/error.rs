//! Error taxonomy for session, tool, and agent failures

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the MCP session and the agent built on top of it.
#[derive(Debug, Error)]
pub enum Error {
    /// The server process could not be started, or the handshake failed.
    #[error("cannot connect to tool server `{command}`: {reason}")]
    Connection { command: String, reason: String },

    /// The server answered with something we could not interpret.
    #[error("protocol error: {reason}")]
    Protocol { reason: String },

    /// The tool ran and reported a failure.
    #[error("tool `{tool}` failed: {detail}")]
    ToolExecution { tool: String, detail: String },

    /// No answer arrived within the bound.
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// The model layer failed while producing a response.
    #[error("agent error: {reason}")]
    Agent { reason: String },

    /// The session is not open.
    #[error("session is closed")]
    SessionClosed,

    /// The tool was not in the last advertised tool list.
    #[error("unknown tool `{tool}`")]
    UnknownTool { tool: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    pub fn agent(reason: impl std::fmt::Display) -> Self {
        Self::Agent {
            reason: reason.to_string(),
        }
    }

    /// Stable label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Connection { .. } => "connection",
            Error::Protocol { .. } => "protocol",
            Error::ToolExecution { .. } => "tool_execution",
            Error::Timeout { .. } => "timeout",
            Error::Agent { .. } => "agent",
            Error::SessionClosed => "session_closed",
            Error::UnknownTool { .. } => "unknown_tool",
        }
    }

    /// Failures the agent reports back to the model instead of aborting the turn
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            Error::ToolExecution { .. } | Error::Timeout { .. } | Error::UnknownTool { .. }
        )
    }
}
