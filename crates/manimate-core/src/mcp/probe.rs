//! Liveness probe run before the interactive session
//!
//! A throwaway session does open → list_tools → close so an unreachable
//! server is reported before the user sees a prompt.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::config::{LaunchSpec, SessionTimeouts};
use super::session::McpSession;
use crate::error::{Error, Result};

/// What a successful probe saw
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub tool_names: Vec<String>,
    pub elapsed: Duration,
}

/// Check that the server starts, handshakes, and advertises at least one tool.
///
/// The probe session is always closed, whatever the outcome.
pub async fn probe(launch: &LaunchSpec, timeouts: &SessionTimeouts) -> Result<ProbeReport> {
    debug!(command = %launch, "Checking MCP server status");
    let start = Instant::now();
    let mut session = McpSession::new(launch.clone(), *timeouts);

    let outcome = async {
        session.open().await?;
        session.list_tools().await
    }
    .await;
    session.close().await;

    let tools = match outcome {
        Ok(tools) => tools,
        Err(e) => {
            warn!(command = %launch, kind = e.kind(), error = %e, "MCP probe failed");
            return Err(e);
        }
    };

    if tools.is_empty() {
        warn!(command = %launch, "MCP probe found no tools");
        return Err(Error::protocol("server advertises no tools"));
    }

    let report = ProbeReport {
        tool_names: tools.into_iter().map(|t| t.name).collect(),
        elapsed: start.elapsed(),
    };
    info!(
        tools = ?report.tool_names,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "MCP probe succeeded"
    );
    Ok(report)
}
