//! End-to-end runs of the `manimate` binary against scripted servers

#![cfg(target_os = "linux")]

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

/// Appends its pid to `pids`, answers initialize and tools/list
const SERVER: &str = r#"echo $$ >> "$1"
reply() { printf '%s\n' '{"jsonrpc":"2.0","id":'"$id"',"result":'"$1"'}'; }
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      reply '{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"mock-manim","version":"0.0.1"}}' ;;
    *'"method":"tools/list"'*)
      reply '{"tools":[{"name":"render_scene","description":"Render a Manim scene","inputSchema":{"type":"object"}}]}' ;;
  esac
done
"#;

/// Appends its pid to `pids` and never answers
const SILENT_SERVER: &str = r#"echo $$ >> "$1"
while IFS= read -r line; do :; done
"#;

struct Fixture {
    home: TempDir,
}

impl Fixture {
    fn new(command: &str, script: Option<&str>) -> Self {
        let home = tempfile::tempdir().unwrap();
        let app = home.path().join("app");
        std::fs::create_dir_all(&app).unwrap();

        let args = match script {
            Some(body) => {
                let path = app.join("server.sh");
                std::fs::write(&path, body).unwrap();
                format!(
                    r#"["{}", "{}"]"#,
                    path.display(),
                    home.path().join("pids").display()
                )
            }
            None => "[]".to_string(),
        };
        let toml = format!(
            "output_dir = \"renders\"\n\n[server]\ncommand = \"{}\"\nargs = {}\nhandshake_timeout_secs = 30\nshutdown_timeout_secs = 1\n",
            command, args
        );
        std::fs::write(app.join("manimate.toml"), toml).unwrap();

        Self { home }
    }

    fn app_dir(&self) -> PathBuf {
        self.home.path().join("app")
    }

    fn command(&self, api_key: Option<&str>) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_manimate"));
        cmd.env("HOME", self.home.path())
            .env("MANIMATE_HOME", self.app_dir())
            .env_remove("MANIMATE_CONFIG")
            .env_remove("MANIMATE_MODEL")
            .env_remove("MANIMATE_PROVIDER")
            .env_remove("RUST_LOG")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        match api_key {
            Some(key) => cmd.env("ANTHROPIC_API_KEY", key),
            None => cmd.env_remove("ANTHROPIC_API_KEY"),
        };
        cmd
    }

    fn server_pids(&self) -> Vec<u32> {
        std::fs::read_to_string(self.home.path().join("pids"))
            .unwrap_or_default()
            .lines()
            .filter_map(|l| l.trim().parse().ok())
            .collect()
    }

    fn wait_for_server_pid(&self) -> u32 {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(pid) = self.server_pids().first() {
                return *pid;
            }
            assert!(Instant::now() < deadline, "server never started");
            thread::sleep(Duration::from_millis(20));
        }
    }
}

struct Finished {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

fn wait_with_timeout(mut child: Child, stdout_seen: String) -> Finished {
    let deadline = Instant::now() + Duration::from_secs(15);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("manimate did not exit");
        }
        thread::sleep(Duration::from_millis(20));
    };

    let mut stdout = stdout_seen;
    if let Some(mut out) = child.stdout.take() {
        out.read_to_string(&mut stdout).unwrap();
    }
    let mut stderr = String::new();
    if let Some(mut err) = child.stderr.take() {
        err.read_to_string(&mut stderr).unwrap();
    }
    Finished {
        status,
        stdout,
        stderr,
    }
}

fn interrupt(child: &Child) {
    let status = Command::new("kill")
        .args(["-s", "INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

fn process_exists(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // Zombies and dead entries count as gone
        Ok(stat) => !matches!(
            stat.rsplit(')').next().and_then(|rest| rest.split_whitespace().next()),
            Some("Z") | Some("X")
        ),
        Err(_) => false,
    }
}

fn all_gone(pids: &[u32]) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if pids.iter().all(|pid| !process_exists(*pid)) {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn test_unreachable_server_exits_with_failure() {
    let fixture = Fixture::new("manimate-no-such-server", None);

    let child = fixture.command(Some("test-key")).spawn().unwrap();
    let done = wait_with_timeout(child, String::new());

    assert_eq!(done.status.code(), Some(1));
    assert!(done.stderr.contains("tool server is not reachable"), "{}", done.stderr);
    assert!(done.stderr.contains("manimate-no-such-server"));
    assert!(!done.stdout.contains("You: "));
}

#[test]
fn test_missing_api_key_is_fatal_after_releasing_the_server() {
    let fixture = Fixture::new("sh", Some(SERVER));

    let child = fixture.command(None).spawn().unwrap();
    let done = wait_with_timeout(child, String::new());

    assert_eq!(done.status.code(), Some(1));
    assert!(done.stderr.contains("Fatal error: No API key"), "{}", done.stderr);
    assert!(!done.stdout.contains("You: "));
    assert!(fixture.app_dir().join("renders").is_dir());

    // One server for the liveness check, one for the session
    let pids = fixture.server_pids();
    assert_eq!(pids.len(), 2);
    assert!(all_gone(&pids));
}

#[test]
fn test_end_of_input_exits_cleanly() {
    let fixture = Fixture::new("sh", Some(SERVER));

    let mut child = fixture.command(Some("test-key")).spawn().unwrap();
    drop(child.stdin.take());
    let done = wait_with_timeout(child, String::new());

    assert_eq!(done.status.code(), Some(0), "{}", done.stderr);
    assert!(done.stdout.contains("render_scene"));
    assert!(all_gone(&fixture.server_pids()));
}

#[test]
fn test_interrupt_at_prompt_exits_cleanly() {
    let fixture = Fixture::new("sh", Some(SERVER));

    let mut child = fixture.command(Some("test-key")).spawn().unwrap();
    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let mut seen = String::new();
    while !seen.contains("You: ") {
        let mut chunk = Vec::new();
        // The prompt has no trailing newline, so stop at its last byte
        let n = stdout.read_until(b' ', &mut chunk).unwrap();
        assert!(n > 0, "stdout closed before the prompt: {}", seen);
        seen.push_str(&String::from_utf8_lossy(&chunk));
    }

    interrupt(&child);
    child.stdout = Some(stdout.into_inner());
    let done = wait_with_timeout(child, seen);

    assert_eq!(done.status.code(), Some(0), "{}", done.stderr);
    assert!(done.stdout.contains("Exiting..."));
    assert!(all_gone(&fixture.server_pids()));
}

#[test]
fn test_interrupt_during_startup_leaves_no_server() {
    let fixture = Fixture::new("sh", Some(SILENT_SERVER));

    let child = fixture.command(Some("test-key")).spawn().unwrap();
    let pid = fixture.wait_for_server_pid();

    interrupt(&child);
    let done = wait_with_timeout(child, String::new());

    assert_eq!(done.status.code(), Some(0), "{}", done.stderr);
    assert!(!done.stdout.contains("You: "));
    assert!(all_gone(&[pid]));
}
