//! MCP (Model Context Protocol) client side
//!
//! One local stdio server, spawned on demand. The session owns the process;
//! the probe checks reachability before the interactive phase begins.

pub mod client;
pub mod config;
pub mod probe;
pub mod protocol;
pub mod session;
pub mod transport;

#[cfg(all(test, unix))]
pub(crate) mod testing;

pub use config::{LaunchSpec, SessionTimeouts};
pub use probe::{probe, ProbeReport};
pub use session::McpSession;
