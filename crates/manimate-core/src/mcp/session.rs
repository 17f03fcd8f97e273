//! Transport session: exclusive owner of the tool server process
//!
//! `open()` spawns and handshakes, `list_tools()` discovers, `invoke()` calls,
//! `close()` tears down. Every successful `open()` starts a new generation;
//! tool descriptors from an older generation are never valid against the
//! current one.

use std::collections::HashSet;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::client::{CallOutcome, McpConnection};
use super::config::{LaunchSpec, SessionTimeouts};
use crate::error::{Error, Result};
use crate::tools::{ToolDescriptor, ToolInvoker};

/// One connection to the tool server, reopenable after close
pub struct McpSession {
    launch: LaunchSpec,
    timeouts: SessionTimeouts,
    connection: Option<McpConnection>,
    generation: u64,
    /// Names from the last `list_tools()` in this generation
    advertised: HashSet<String>,
}

impl McpSession {
    pub fn new(launch: LaunchSpec, timeouts: SessionTimeouts) -> Self {
        Self {
            launch,
            timeouts,
            connection: None,
            generation: 0,
            advertised: HashSet::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Generation of the current (or last) open connection. 0 = never opened.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Spawn the server and complete the handshake. Reuses a live connection.
    pub async fn open(&mut self) -> Result<()> {
        if let Some(conn) = &self.connection {
            if conn.is_alive().await {
                return Ok(());
            }
            warn!(command = %self.launch, "MCP server died, respawning");
            self.close().await;
        }

        let start = Instant::now();
        let conn = McpConnection::connect(&self.launch, self.timeouts.request)?;

        let handshake = tokio::time::timeout(self.timeouts.handshake, conn.initialize()).await;
        let failure = match handshake {
            Ok(Ok(_)) => None,
            Ok(Err(Error::Connection { reason, .. })) => Some(reason),
            Ok(Err(e)) => Some(format!("handshake failed: {}", e)),
            Err(_) => Some(format!(
                "handshake timed out after {}s",
                self.timeouts.handshake.as_secs_f32()
            )),
        };

        if let Some(reason) = failure {
            conn.shutdown(self.timeouts.shutdown).await;
            return Err(Error::Connection {
                command: self.launch.to_string(),
                reason,
            });
        }

        self.generation += 1;
        self.advertised.clear();
        self.connection = Some(conn);

        info!(
            command = %self.launch,
            generation = self.generation,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "MCP session open"
        );
        Ok(())
    }

    /// Fetch the advertised tools, in server order
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        let conn = self.connection.as_ref().ok_or(Error::SessionClosed)?;
        let defs = conn.list_tools().await?;

        let mut seen = HashSet::new();
        for def in &defs {
            if def.name.trim().is_empty() {
                return Err(Error::protocol("server advertised a tool with an empty name"));
            }
            if !seen.insert(def.name.clone()) {
                return Err(Error::protocol(format!(
                    "server advertised tool `{}` twice",
                    def.name
                )));
            }
        }

        info!(generation = self.generation, count = defs.len(), "MCP tools listed");
        self.advertised = seen;

        let generation = self.generation;
        Ok(defs
            .into_iter()
            .map(|def| ToolDescriptor::from_mcp(def, generation))
            .collect())
    }

    /// Call a tool advertised by the last `list_tools()`
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<String> {
        let conn = self.connection.as_ref().ok_or(Error::SessionClosed)?;
        if !self.advertised.contains(name) {
            return Err(Error::UnknownTool {
                tool: name.to_string(),
            });
        }

        let start = Instant::now();
        let outcome = conn.call_tool(name, arguments).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome? {
            CallOutcome::Completed(result) if !result.is_error => {
                info!(tool = name, elapsed_ms, "Tool call succeeded");
                Ok(result.text())
            }
            CallOutcome::Completed(result) => {
                warn!(tool = name, elapsed_ms, "Tool reported an error");
                Err(Error::ToolExecution {
                    tool: name.to_string(),
                    detail: result.text(),
                })
            }
            CallOutcome::Rejected(rpc) => {
                warn!(tool = name, code = rpc.code, "Tool call rejected");
                Err(Error::ToolExecution {
                    tool: name.to_string(),
                    detail: rpc.to_string(),
                })
            }
        }
    }

    /// Terminate the server. Safe to call when closed or never opened.
    pub async fn close(&mut self) {
        self.advertised.clear();
        if let Some(conn) = self.connection.take() {
            conn.shutdown(self.timeouts.shutdown).await;
            info!(command = %self.launch, generation = self.generation, "MCP session closed");
        }
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            warn!(command = %self.launch, "MCP session dropped while open, killing server");
            conn.kill_now();
        }
    }
}

#[async_trait]
impl ToolInvoker for McpSession {
    fn generation(&self) -> u64 {
        self.generation
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<String> {
        McpSession::invoke(self, name, arguments).await
    }
}
