//! manimate - chat with an agent that renders Manim animations
//!
//! Starts the render tool server over stdio, checks it is alive, then runs
//! an interactive loop where each line is one turn for the agent.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use manimate_core::agent::{Agent, AgentConfig};
use manimate_core::ai::{AiClient, ModelBackend};
use manimate_core::config::AppConfig;
use manimate_core::constants;
use manimate_core::credentials::{resolve_api_key, CredentialStore};
use manimate_core::mcp::{self, McpSession};
use manimate_core::paths;
use manimate_core::repl::ConversationLoop;
use manimate_core::tools::ToolRegistry;

fn main() -> ExitCode {
    // Log to file so output never interleaves with the prompt
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Fatal error: failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = match runtime.block_on(run()) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Fatal error: {:#}", e);
            eprintln!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    };

    // A blocked stdin read must not hold the process open
    runtime.shutdown_timeout(Duration::from_millis(200));
    code
}

fn init_logging() -> Result<()> {
    let log_dir = paths::logs_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory: {}", e);
    }

    #[cfg(unix)]
    let null_device = "/dev/null";
    #[cfg(windows)]
    let null_device = "NUL";

    let log_file = match std::fs::File::create(log_dir.join(constants::app::LOG_FILE_NAME)) {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "Failed to create log file: {}, falling back to null device",
                e
            );
            std::fs::File::create(null_device)
                .with_context(|| format!("Failed to create null device {}", null_device))?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}

async fn run() -> Result<ExitCode> {
    // Watch for Ctrl-C before any child exists, so no startup phase can
    // leave the server behind
    let cancel = CancellationToken::new();
    let watcher = spawn_interrupt_watcher(cancel.clone())?;

    let outcome = start_and_chat(&cancel).await;
    watcher.abort();
    outcome
}

async fn start_and_chat(cancel: &CancellationToken) -> Result<ExitCode> {
    let app_dir = paths::app_dir();
    let (config, source) = AppConfig::load(&app_dir)?;

    let output_dir = config.output_dir(&app_dir);
    paths::ensure_dir(&output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    tracing::info!(
        app_dir = ?app_dir,
        output_dir = ?output_dir,
        config = ?source,
        "Starting manimate"
    );

    let launch = config.launch_spec(&app_dir);
    let timeouts = config.timeouts();

    // Dropping the in-flight check kills its server
    let checked = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(interrupted_during("liveness check")),
        checked = mcp::probe(&launch, &timeouts) => checked,
    };
    match checked {
        Ok(report) => tracing::info!(
            tools = ?report.tool_names,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Tool server is reachable"
        ),
        Err(e) => {
            tracing::error!(kind = e.kind(), error = %e, "Liveness probe failed");
            eprintln!(
                "Error: tool server is not reachable ({}); start it first: {}",
                e, launch
            );
            return Ok(ExitCode::FAILURE);
        }
    }

    let mut session = McpSession::new(launch, timeouts);
    let outcome = interact(&config, &mut session, cancel).await;
    session.close().await;
    outcome
}

/// Everything that runs while the session is open
async fn interact(
    config: &AppConfig,
    session: &mut McpSession,
    cancel: &CancellationToken,
) -> Result<ExitCode> {
    let registry = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(interrupted_during("connect")),
        registry = connect(session) => registry?,
    };
    if registry.is_empty() {
        anyhow::bail!("The render server advertises no tools");
    }

    let model = build_model(config)?;
    let agent_config = AgentConfig::new(&registry, config.model(), config.system_prompt())
        .with_max_tool_rounds(config.agent.max_tool_rounds)
        .with_max_tokens(config.agent.max_tokens);
    let mut agent = Agent::new(agent_config, model, &*session);

    println!(
        "Connected to the render server (tools: {}; model {}). Press Ctrl-C to exit.",
        agent.config().tool_names().join(", "),
        agent.config().model
    );

    let mut repl = ConversationLoop::new(
        BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
        cancel.clone(),
    );
    let exit = repl
        .run(&mut agent)
        .await
        .context("Conversation loop failed")?;
    tracing::info!(?exit, "Shutting down");
    Ok(ExitCode::SUCCESS)
}

async fn connect(session: &mut McpSession) -> Result<ToolRegistry> {
    session.open().await?;
    let registry = ToolRegistry::from_session(session).await?;
    tracing::info!(
        tools = ?registry.names(),
        generation = registry.generation(),
        "Tools discovered"
    );
    Ok(registry)
}

fn interrupted_during(phase: &str) -> ExitCode {
    tracing::info!(phase, "Interrupted during startup");
    println!("\nExiting...");
    ExitCode::SUCCESS
}

fn build_model(config: &AppConfig) -> Result<Arc<dyn ModelBackend>> {
    let provider = config.agent.provider;
    let env_name = config
        .agent
        .api_key_env
        .as_deref()
        .unwrap_or(provider.api_key_env());

    let store = CredentialStore::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable credentials file: {:#}", e);
        CredentialStore::default()
    });
    let api_key = resolve_api_key(provider, Some(env_name), &store)
        .with_context(|| format!("No API key for {}; set {}", provider, env_name))?;

    Ok(Arc::new(AiClient::new(config.ai_client_config(), api_key)))
}

/// Registers the SIGINT handler immediately rather than on first poll
#[cfg(unix)]
fn spawn_interrupt_watcher(cancel: CancellationToken) -> Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt =
        signal(SignalKind::interrupt()).context("Failed to listen for Ctrl-C")?;
    Ok(tokio::spawn(async move {
        if interrupt.recv().await.is_some() {
            tracing::info!("Interrupt received");
            cancel.cancel();
        }
    }))
}

#[cfg(not(unix))]
fn spawn_interrupt_watcher(cancel: CancellationToken) -> Result<tokio::task::JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received");
                cancel.cancel();
            }
            Err(e) => tracing::warn!("Failed to listen for Ctrl-C: {}", e),
        }
    }))
}
