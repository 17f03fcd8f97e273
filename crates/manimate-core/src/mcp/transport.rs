//! MCP stdio transport
//!
//! Newline-delimited JSON over the child's stdin/stdout. Each message is a
//! JSON object followed by a newline. Stderr is drained into the log.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::config::LaunchSpec;
use crate::error::{Error, Result};

/// Stdio transport for a local MCP server
pub struct StdioTransport {
    command: String,
    /// `None` once shutdown has closed the pipe
    stdin: Mutex<Option<ChildStdin>>,
    stdout: Mutex<BufReader<ChildStdout>>,
    child: Mutex<Child>,
    /// Leader of the server's process group
    pid: Option<u32>,
}

impl StdioTransport {
    /// Spawn the server process
    pub fn spawn(launch: &LaunchSpec) -> Result<Self> {
        info!(command = %launch, dir = ?launch.working_dir, "Spawning MCP server");
        for key in launch.env.keys() {
            debug!("  env {}=<set>", key);
        }

        let mut cmd = Command::new(&launch.command);
        cmd.args(&launch.args)
            .envs(&launch.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(&launch.working_dir)
            .kill_on_drop(true);

        // Own process group, so launchers like `uv run` can be killed with
        // their children and a terminal Ctrl-C does not reach the server
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| Error::Connection {
            command: launch.to_string(),
            reason: if e.kind() == std::io::ErrorKind::NotFound {
                format!(
                    "command not found: {} (is it installed and in PATH?)",
                    launch.command
                )
            } else {
                format!("failed to spawn: {}", e)
            },
        })?;

        let pid = child.id();
        let lost = |what: &str| Error::Connection {
            command: launch.to_string(),
            reason: format!("child has no {}", what),
        };
        let stdin = child.stdin.take().ok_or_else(|| lost("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| lost("stdout"))?;

        if let Some(stderr) = child.stderr.take() {
            let command = launch.command.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server = %command, "stderr: {}", line);
                }
            });
        }

        Ok(Self {
            command: launch.to_string(),
            stdin: Mutex::new(Some(stdin)),
            stdout: Mutex::new(BufReader::new(stdout)),
            child: Mutex::new(child),
            pid,
        })
    }

    /// Send a JSON-RPC message (newline-delimited JSON)
    pub async fn send(&self, message: &str) -> Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or_else(|| self.lost("stdin already closed"))?;

        let write = async {
            stdin.write_all(message.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        write
            .await
            .map_err(|e| self.lost(&format!("write failed: {}", e)))?;

        debug!("Sent: {}", message);
        Ok(())
    }

    /// Receive a JSON-RPC message (newline-delimited JSON)
    pub async fn receive(&self) -> Result<String> {
        let mut stdout = self.stdout.lock().await;

        loop {
            let mut line = String::new();
            let bytes = stdout
                .read_line(&mut line)
                .await
                .map_err(|e| self.lost(&format!("read failed: {}", e)))?;

            if bytes == 0 {
                // EOF - check if process died
                let mut child = self.child.lock().await;
                let reason = match child.try_wait() {
                    Ok(Some(status)) => format!("server exited with {}", status),
                    Ok(None) => "server closed stdout unexpectedly".to_string(),
                    Err(e) => format!("error checking server status: {}", e),
                };
                return Err(self.lost(&reason));
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('{') {
                debug!("Received: {}", line);
                return Ok(line.to_string());
            }

            // Servers commonly print banners or progress on stdout
            debug!("Skipping non-JSON line: {}", line);
        }
    }

    /// Check if process is still running
    pub async fn is_alive(&self) -> bool {
        let mut child = self.child.lock().await;
        matches!(child.try_wait(), Ok(None))
    }

    /// Close stdin, give the server `grace` to exit, then kill it.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self, grace: Duration) {
        // Dropping stdin signals EOF to the server
        self.stdin.lock().await.take();

        let mut child = self.child.lock().await;
        if let Ok(Some(status)) = child.try_wait() {
            debug!(server = %self.command, %status, "MCP server already exited");
            return;
        }

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                info!(server = %self.command, %status, "MCP server exited");
            }
            Ok(Err(e)) => {
                warn!(server = %self.command, error = %e, "Waiting for MCP server failed, killing");
                self.kill_group();
                let _ = child.kill().await;
            }
            Err(_) => {
                warn!(
                    server = %self.command,
                    grace_ms = grace.as_millis() as u64,
                    "MCP server did not exit in time, killing"
                );
                self.kill_group();
                let _ = child.kill().await;
            }
        }
    }

    /// Send SIGKILL without waiting. Used from `Drop`, where we cannot await.
    pub fn kill_now(&self) {
        if let Ok(mut child) = self.child.try_lock() {
            if let Ok(None) = child.try_wait() {
                self.kill_group();
                let _ = child.start_kill();
            }
        }
    }

    /// SIGKILL the whole process group. Only call while the leader is
    /// unreaped, so the group id cannot have been reused.
    fn kill_group(&self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            let result = std::process::Command::new("kill")
                .args(["-s", "KILL", "--", &format!("-{}", pid)])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            if let Err(e) = result {
                debug!(server = %self.command, error = %e, "Process group kill failed");
            }
        }
    }

    fn lost(&self, reason: &str) -> Error {
        Error::Connection {
            command: self.command.clone(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::mcp::testing::{wait_for_pid_file, wait_until_gone};
    use std::path::PathBuf;

    fn sh(script: &str) -> LaunchSpec {
        LaunchSpec::new(
            "sh",
            vec!["-c".to_string(), script.to_string()],
            PathBuf::from("/tmp"),
        )
    }

    #[tokio::test]
    async fn test_spawn_missing_command_is_connection_error() {
        let spec = LaunchSpec::new(
            "manimate-definitely-not-a-real-binary",
            Vec::new(),
            PathBuf::from("/tmp"),
        );
        let err = StdioTransport::spawn(&spec).err().unwrap();
        assert_eq!(err.kind(), "connection");
        assert!(err.to_string().contains("command not found"));
    }

    #[tokio::test]
    async fn test_receive_skips_banner_lines() {
        let transport = StdioTransport::spawn(&sh(
            "echo 'Starting server...'; echo '{\"jsonrpc\":\"2.0\",\"id\":1}'; sleep 5",
        ))
        .unwrap();

        let msg = transport.receive().await.unwrap();
        assert_eq!(msg, "{\"jsonrpc\":\"2.0\",\"id\":1}");
        transport.shutdown(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_receive_reports_exit() {
        let transport = StdioTransport::spawn(&sh("exit 3")).unwrap();
        let err = transport.receive().await.unwrap_err();
        assert_eq!(err.kind(), "connection");
    }

    #[tokio::test]
    async fn test_shutdown_kills_stubborn_server_and_is_idempotent() {
        // Ignores stdin EOF, so only the kill can stop it
        let transport = StdioTransport::spawn(&sh("trap '' TERM; sleep 30")).unwrap();
        assert!(transport.is_alive().await);

        transport.shutdown(Duration::from_millis(100)).await;
        assert!(!transport.is_alive().await);

        transport.shutdown(Duration::from_millis(100)).await;
        assert!(transport.send("{}").await.is_err());
    }

    #[tokio::test]
    async fn test_forced_shutdown_takes_down_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("grandchild.pid");
        // A launcher whose child ignores stdin EOF
        let transport = StdioTransport::spawn(&sh(&format!(
            "sleep 30 & echo $! > '{}'; trap '' TERM; wait",
            pid_file.display()
        )))
        .unwrap();

        let grandchild = wait_for_pid_file(&pid_file).await;
        transport.shutdown(Duration::from_millis(100)).await;

        assert!(!transport.is_alive().await);
        assert!(wait_until_gone(grandchild).await);
    }

    #[tokio::test]
    async fn test_kill_now_takes_down_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("grandchild.pid");
        let transport = StdioTransport::spawn(&sh(&format!(
            "sleep 30 & echo $! > '{}'; wait",
            pid_file.display()
        )))
        .unwrap();

        let grandchild = wait_for_pid_file(&pid_file).await;
        transport.kill_now();

        assert!(wait_until_gone(grandchild).await);
    }

    #[tokio::test]
    async fn test_shutdown_lets_cooperative_server_exit() {
        // Exits on its own once stdin closes
        let transport = StdioTransport::spawn(&sh("cat > /dev/null")).unwrap();
        transport.shutdown(Duration::from_secs(5)).await;
        assert!(!transport.is_alive().await);
    }
}
