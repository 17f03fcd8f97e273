//! HTTP client for model providers

mod config;
mod core;
mod tools;

pub use self::config::AiClientConfig;
pub use self::core::AiClient;
