//! AI provider layer
//!
//! Talks to Anthropic-compatible and OpenAI-compatible chat APIs with tool
//! calling. Everything above this layer sees Anthropic-shaped content blocks.

pub mod backend;
pub mod client;
pub mod format;
pub mod providers;
pub mod retry;
pub mod types;

pub use backend::ModelBackend;
pub use client::{AiClient, AiClientConfig};
