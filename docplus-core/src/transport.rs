//! Transport interfaces the host consumes.
//!
//! The AI provider protocol and the privileged command runtime live outside
//! this crate; the host only sees these traits.

use async_trait::async_trait;
use serde_json::Value;

use crate::chat::ChatRequest;
use crate::error::Result;

/// AI backend used by the extension host.
#[async_trait]
pub trait AiTransport: Send + Sync {
    /// One-shot generation returning the raw response text.
    async fn chat(&self, request: ChatRequest) -> Result<String>;

    /// Streaming generation.
    ///
    /// Implementations publish every chunk to the shared
    /// [`ChunkHub`](crate::ChunkHub) tagged with `request_id`, and resolve with
    /// the full raw text once the provider is done.
    async fn chat_stream(&self, request: ChatRequest, request_id: &str) -> Result<String>;
}

/// Privileged command runtime behind the allowlist gate.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn invoke(&self, name: &str, args: Value) -> Result<Value>;
}
