//! DocPlus SDK - Extension Host
//!
//! This crate hosts untrusted panel extensions and mediates everything they
//! can do:
//!
//! # Core Modules (from docplus-core)
//!
//! - **allowlist** - Command allowlist gate
//! - **think** - Think-tag parser
//! - **chat** - Chat messages, requests and AI settings
//! - **stream** - Chunk hub for streamed generations
//! - **storage** - Key-value backends
//!
//! # SDK Modules
//!
//! - **extensions** - Capability bundles, streaming chat bridge, event bus,
//!   lifecycle supervisor, registry and plugin manifests
//! - **host** - Composition root wiring the above together
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docplus_sdk::{ExtensionHost, HostConfig};
//! use docplus_sdk::extensions::{ContentSnapshot, HostServices, SlotView};
//!
//! async fn example(services: HostServices) -> anyhow::Result<()> {
//!     let host = ExtensionHost::new(HostConfig::new("plugins"), services)?;
//!
//!     host.supervisor()
//!         .activate("summarizer", ContentSnapshot::new("doc-1"))
//!         .await?;
//!
//!     if let SlotView::Failed { failure, .. } = host.supervisor().render().await {
//!         eprintln!("{} failed: {}", failure.extension_id, failure.message);
//!     }
//!     Ok(())
//! }
//! ```

// ─────────────────────────────────────────────────────────────────────────────
// Re-export core modules from docplus-core
// ─────────────────────────────────────────────────────────────────────────────

/// Command allowlist gate
pub use docplus_core::allowlist;

/// Think-tag parser
pub use docplus_core::think;

/// Chat messages, requests and AI settings
pub use docplus_core::chat;

/// Chunk hub for streamed generations
pub use docplus_core::stream;

/// Error types from core
pub use docplus_core::error as core_error;

// ─────────────────────────────────────────────────────────────────────────────
// SDK-specific modules
// ─────────────────────────────────────────────────────────────────────────────

pub mod extensions;
pub mod utils;

mod config;
mod error;
mod host;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    CommandsConfig, ConfigValidationError, DEFAULT_MAX_BUFFER_BYTES, HostConfig, StorageConfig,
    StreamConfig,
};
pub use error::{SDKError, SDKResult};
pub use host::{ExtensionHost, open_storage};

pub use extensions::{
    CapabilityBundle, ContentSnapshot, ExtensionDescriptor, HostEvent, HostServices,
    PanelExtension, SlotView,
};
