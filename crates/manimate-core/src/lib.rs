//! Manimate core library
//!
//! Session lifecycle for a local MCP tool server, the agent that drives it,
//! and the conversation loop that feeds the agent user turns.

pub mod agent;
pub mod ai;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod mcp;
pub mod paths;
pub mod repl;
pub mod tools;

pub use error::{Error, Result};
