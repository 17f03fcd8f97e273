//! MCP connection to a single local server
//!
//! Handles JSON-RPC request/response matching. A background receive loop
//! routes responses to waiting requests by id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, error, info};

use super::config::LaunchSpec;
use super::protocol::{
    ClientInfo, InitializeParams, InitializeResult, McpNotification, McpRequest, McpResponse,
    McpRpcError, McpToolDef, ToolCallParams, ToolCallResult, ToolsListResult,
};
use super::transport::StdioTransport;
use crate::constants::server::PROTOCOL_VERSION;
use crate::error::{Error, Result};

/// What the receive loop hands back to a waiting request
enum Reply {
    Result(Value),
    RpcError(McpRpcError),
    Lost(String),
}

type PendingMap = Arc<RwLock<HashMap<i64, oneshot::Sender<Reply>>>>;

/// Outcome of a tools/call that reached the server
#[derive(Debug)]
pub enum CallOutcome {
    Completed(ToolCallResult),
    Rejected(McpRpcError),
}

/// Live JSON-RPC connection to a spawned server
pub struct McpConnection {
    command: String,
    transport: Arc<StdioTransport>,
    next_id: AtomicI64,
    pending: PendingMap,
    request_timeout: Duration,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl McpConnection {
    /// Spawn the server and start the receive loop. Does not handshake.
    pub fn connect(launch: &LaunchSpec, request_timeout: Duration) -> Result<Self> {
        let transport = Arc::new(StdioTransport::spawn(launch)?);
        let pending: PendingMap = Arc::new(RwLock::new(HashMap::new()));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let recv_transport = Arc::clone(&transport);
        let recv_pending = Arc::clone(&pending);
        let recv_name = launch.command.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("MCP {} shutting down receive loop", recv_name);
                        break;
                    }
                    result = recv_transport.receive() => {
                        match result {
                            Ok(message) => {
                                if let Err(e) = handle_message(&message, &recv_pending).await {
                                    error!("MCP {} message error: {}", recv_name, e);
                                }
                            }
                            Err(e) => {
                                error!("MCP {} receive error: {}", recv_name, e);
                                let mut pending = recv_pending.write().await;
                                for (_, tx) in pending.drain() {
                                    let _ = tx.send(Reply::Lost(e.to_string()));
                                }
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            command: launch.to_string(),
            transport,
            next_id: AtomicI64::new(1),
            pending,
            request_timeout,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Run the initialize handshake
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: serde_json::json!({}),
            client_info: ClientInfo {
                name: "manimate".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let result: InitializeResult = match self.request("initialize", Some(to_value(params)?)).await? {
            Ok(value) => parse(value, "initialize")?,
            Err(rpc) => {
                return Err(Error::Connection {
                    command: self.command.clone(),
                    reason: format!("initialize rejected: {}", rpc),
                })
            }
        };

        info!(
            server = result.server_info.as_ref().map(|s| s.name.as_str()).unwrap_or("unknown"),
            version = result.server_info.as_ref().and_then(|s| s.version.as_deref()).unwrap_or("-"),
            protocol = %result.protocol_version,
            "MCP server initialized"
        );

        self.notify("notifications/initialized", None).await?;
        Ok(result)
    }

    /// List the tools the server advertises, in server order
    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>> {
        let value = self
            .request("tools/list", None)
            .await?
            .map_err(|rpc| Error::protocol(format!("tools/list rejected: {}", rpc)))?;
        let result: ToolsListResult = parse(value, "tools/list")?;

        for tool in &result.tools {
            debug!(
                "MCP tool '{}' schema: {}",
                tool.name,
                serde_json::to_string(&tool.input_schema).unwrap_or_default()
            );
        }

        Ok(result.tools)
    }

    /// Call a tool. JSON-RPC level rejections come back as `CallOutcome::Rejected`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallOutcome> {
        let params = ToolCallParams {
            name: name.to_string(),
            arguments: if arguments.is_null() {
                None
            } else {
                Some(arguments)
            },
        };

        match self.request("tools/call", Some(to_value(params)?)).await? {
            Ok(value) => Ok(CallOutcome::Completed(parse(value, "tools/call")?)),
            Err(rpc) => Ok(CallOutcome::Rejected(rpc)),
        }
    }

    /// Check if the server process is alive
    pub async fn is_alive(&self) -> bool {
        self.transport.is_alive().await
    }

    /// Stop the receive loop and terminate the server
    pub async fn shutdown(mut self, grace: Duration) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
        self.fail_pending("session closed").await;
        self.transport.shutdown(grace).await;
    }

    /// Kill the server without waiting
    pub fn kill_now(&self) {
        self.transport.kill_now();
    }

    /// Send a request and wait for its reply.
    ///
    /// The outer `Result` covers transport failures and timeouts; the inner one
    /// carries a JSON-RPC error returned by the server.
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<std::result::Result<Value, McpRpcError>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let json = serde_json::to_string(&McpRequest::new(id, method, params))
            .map_err(|e| Error::protocol(format!("cannot encode {}: {}", method, e)))?;

        debug!("MCP request [{}]: {}", id, method);

        let (tx, rx) = oneshot::channel();
        self.pending.write().await.insert(id, tx);

        if let Err(e) = self.transport.send(&json).await {
            self.pending.write().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(Reply::Result(value))) => Ok(Ok(value)),
            Ok(Ok(Reply::RpcError(rpc))) => Ok(Err(rpc)),
            Ok(Ok(Reply::Lost(reason))) => Err(Error::Connection {
                command: self.command.clone(),
                reason,
            }),
            Ok(Err(_)) => Err(Error::Connection {
                command: self.command.clone(),
                reason: "request cancelled".to_string(),
            }),
            Err(_) => {
                self.pending.write().await.remove(&id);
                Err(Error::Timeout {
                    operation: method.to_string(),
                    after: self.request_timeout,
                })
            }
        }
    }

    /// Send a notification (no response expected)
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let json = serde_json::to_string(&McpNotification::new(method, params))
            .map_err(|e| Error::protocol(format!("cannot encode {}: {}", method, e)))?;
        debug!("MCP notify: {}", method);
        self.transport.send(&json).await
    }

    async fn fail_pending(&self, reason: &str) {
        let mut pending = self.pending.write().await;
        for (_, tx) in pending.drain() {
            let _ = tx.send(Reply::Lost(reason.to_string()));
        }
    }
}

impl Drop for McpConnection {
    /// Also runs when an `open()` is abandoned mid-handshake, so the server
    /// never outlives its connection.
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
        self.transport.kill_now();
    }
}

fn to_value<T: serde::Serialize>(params: T) -> Result<Value> {
    serde_json::to_value(params).map_err(|e| Error::protocol(format!("cannot encode params: {}", e)))
}

fn parse<T: DeserializeOwned>(value: Value, method: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| Error::protocol(format!("malformed {} response: {}", method, e)))
}

/// Route an incoming message to its waiting request
async fn handle_message(message: &str, pending: &PendingMap) -> Result<()> {
    let response: McpResponse = serde_json::from_str(message)
        .map_err(|e| Error::protocol(format!("invalid JSON-RPC message: {}", e)))?;

    if let Some(id) = response.id {
        if response.method.is_some() {
            // Server-to-client request (sampling, roots); we advertise no such capability
            debug!("Ignoring server request {} [{}]", response.method.unwrap_or_default(), id);
            return Ok(());
        }
        let mut pending = pending.write().await;
        if let Some(tx) = pending.remove(&id) {
            let reply = match response.error {
                Some(error) => Reply::RpcError(error),
                None => Reply::Result(response.result.unwrap_or(Value::Null)),
            };
            let _ = tx.send(reply);
        } else {
            debug!("Response for unknown request id {}", id);
        }
        return Ok(());
    }

    if let Some(method) = &response.method {
        debug!("MCP notification: {}", method);
    }

    Ok(())
}
