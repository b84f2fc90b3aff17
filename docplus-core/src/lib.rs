//! docplus-core - Core library for the DocPlus extension host
//!
//! This crate provides the leaf components the extension host is built on:
//!
//! - **allowlist**: Command allowlist gate in front of privileged commands
//! - **think**: Think-tag parser separating reasoning from visible content
//! - **chat**: Chat messages, requests and AI settings
//! - **transport**: AI and command transport interfaces
//! - **stream**: Chunk hub correlating streamed chunks by request id
//! - **storage**: Key-value backends for extension-private data
//! - **db**: SQLite key-value backend (feature `db`)

pub mod allowlist;
pub mod chat;
#[cfg(feature = "db")]
pub mod db;
pub mod error;
pub mod storage;
pub mod stream;
pub mod think;
pub mod transport;

// Re-export commonly used types
pub use allowlist::{CommandAllowlist, CommandGate, DEFAULT_ALLOWED_COMMANDS};
pub use chat::{AiSettings, ChatMessage, ChatRequest, MessageRole};
pub use error::{Error, Result};
pub use storage::{KeyValueBackend, MemoryBackend};
pub use stream::{ChunkHub, ChunkSubscription, StreamChunk};
pub use think::{ThinkParseResult, parse_think_tags};
pub use transport::{AiTransport, CommandTransport};

#[cfg(feature = "db")]
pub use db::SqliteBackend;
