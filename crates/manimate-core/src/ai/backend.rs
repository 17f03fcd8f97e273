//! Model backend seam
//!
//! The agent talks to the model only through this trait, so the
//! non-deterministic decision layer can be replaced in tests.

use anyhow::Result;
use async_trait::async_trait;

use super::types::{ModelReply, ModelRequest};

#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// One model round trip
    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply>;
}
