//! Application-wide constants

pub mod app {
    /// Name of the per-user config directory under $HOME
    pub const CONFIG_DIR_NAME: &str = ".manimate";
    /// Config file looked up in the application directory
    pub const LOCAL_CONFIG_FILE: &str = "manimate.toml";
    /// Config file looked up in the per-user config directory
    pub const USER_CONFIG_FILE: &str = "config.toml";
    /// Log file name inside the logs directory
    pub const LOG_FILE_NAME: &str = "manimate.log";
    /// Default directory the render server writes into
    pub const DEFAULT_OUTPUT_DIR: &str = "output";
}

pub mod server {
    /// Default launch command for the render server
    pub const DEFAULT_COMMAND: &str = "uv";
    /// Default server script, relative to the application directory
    pub const DEFAULT_SCRIPT: &str = "src/manim_server.py";
    /// MCP protocol revision we speak
    pub const PROTOCOL_VERSION: &str = "2024-11-05";
    pub const HANDSHAKE_TIMEOUT_SECS: u64 = 30;
    /// Renders routinely take minutes
    pub const REQUEST_TIMEOUT_SECS: u64 = 300;
    pub const SHUTDOWN_TIMEOUT_SECS: u64 = 5;
}

pub mod ai {
    pub const MAX_OUTPUT_TOKENS: usize = 4096;
    /// Upper bound on model/tool round trips within one turn
    pub const MAX_TOOL_ROUNDS: usize = 16;
    pub const ANTHROPIC_VERSION: &str = "2023-06-01";
}
