//! Agent orchestrator
//!
//! - `AgentConfig` - tool set, prompt and model, fixed for one session generation
//! - `Agent` - runs one conversation turn: model calls interleaved with tool calls
//! - `AgentReply` - final text plus any tool failures seen during the turn

pub mod config;
pub mod orchestrator;
pub mod prompt;

pub use config::AgentConfig;
pub use orchestrator::{Agent, AgentReply, ToolFailure};
