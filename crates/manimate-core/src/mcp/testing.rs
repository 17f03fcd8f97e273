//! Scripted `sh` MCP servers for tests

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use super::config::LaunchSpec;

const TOOLS: &str = r#"{"tools":[{"name":"render_scene","description":"Render a Manim scene","inputSchema":{"type":"object","properties":{"code":{"type":"string"}},"required":["code"]}},{"name":"fail_scene","description":"Always fails","inputSchema":{"type":"object"}},{"name":"slow_scene","description":"Takes a while","inputSchema":{"type":"object"}}]}"#;

const DISPATCH: &str = r#"
    *'"name":"render_scene"'*)
      reply '{"content":[{"type":"text","text":"Rendered output/scene.mp4"}],"isError":false}' ;;
    *'"name":"fail_scene"'*)
      reply '{"content":[{"type":"text","text":"NameError: Circle is not defined"}],"isError":true}' ;;
    *'"name":"slow_scene"'*)
      sleep 2
      reply '{"content":[{"type":"text","text":"done"}]}' ;;
    *'"method":"tools/call"'*)
      fail '{"code":-32602,"message":"Unknown tool"}' ;;
"#;

pub(crate) struct MockServer {
    dir: TempDir,
    script: PathBuf,
}

impl MockServer {
    /// Advertises render_scene, fail_scene and slow_scene
    pub(crate) fn standard() -> Self {
        Self::build(TOOLS, DISPATCH)
    }

    /// Advertises nothing
    pub(crate) fn no_tools() -> Self {
        Self::build(r#"{"tools":[]}"#, "")
    }

    /// Answers tools/list with a payload that is not a tool list
    pub(crate) fn malformed_listing() -> Self {
        Self::build(r#"{"tools":"not-a-list"}"#, "")
    }

    /// Reads requests and never answers
    pub(crate) fn silent() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let pid_file = dir.path().join("server.pid");
        let body = format!(
            "echo $$ > '{}'\nwhile IFS= read -r line; do :; done\n",
            pid_file.display()
        );
        Self::write(dir, &body)
    }

    fn build(tools: &str, dispatch: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let pid_file = dir.path().join("server.pid");
        let body = format!(
            r#"echo $$ > '{pid}'
echo "mock manim server ready"
reply() {{ printf '%s\n' '{{"jsonrpc":"2.0","id":'"$id"',"result":'"$1"'}}'; }}
fail() {{ printf '%s\n' '{{"jsonrpc":"2.0","id":'"$id"',"error":'"$1"'}}'; }}
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      reply '{{"protocolVersion":"2024-11-05","capabilities":{{"tools":{{}}}},"serverInfo":{{"name":"mock-manim","version":"0.0.1"}}}}' ;;
    *'"method":"tools/list"'*)
      reply '{tools}' ;;
{dispatch}
  esac
done
"#,
            pid = pid_file.display(),
            tools = tools,
            dispatch = dispatch,
        );
        Self::write(dir, &body)
    }

    fn write(dir: TempDir, body: &str) -> Self {
        let script = dir.path().join("server.sh");
        std::fs::write(&script, body).expect("write mock server");
        Self { dir, script }
    }

    pub(crate) fn launch(&self) -> LaunchSpec {
        LaunchSpec::new(
            "sh",
            vec![self.script.display().to_string()],
            self.dir.path().to_path_buf(),
        )
    }

    /// Pid of the most recently started server process
    pub(crate) fn pid(&self) -> Option<u32> {
        read_pid(&self.dir.path().join("server.pid"))
    }

    /// Like `pid`, but waits for the server to get far enough to write it
    pub(crate) async fn wait_for_pid(&self) -> u32 {
        wait_for_pid_file(&self.dir.path().join("server.pid")).await
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Poll until a script has written its pid file
pub(crate) async fn wait_for_pid_file(path: &Path) -> u32 {
    for _ in 0..100 {
        if let Some(pid) = read_pid(path) {
            return pid;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("no pid written to {:?}", path);
}

/// Poll until `pid` is gone. False if it is still running after two seconds.
pub(crate) async fn wait_until_gone(pid: u32) -> bool {
    for _ in 0..100 {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// True if `pid` is a running (non-zombie) process
pub(crate) fn process_exists(pid: u32) -> bool {
    let proc_root = std::path::Path::new("/proc");
    if proc_root.is_dir() {
        return match std::fs::read_to_string(proc_root.join(pid.to_string()).join("stat")) {
            // State is the first field after the parenthesised command name
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .map(|state| state != 'Z' && state != 'X')
                .unwrap_or(false),
            Err(_) => false,
        };
    }

    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
