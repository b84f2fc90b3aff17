//! Extension System
//!
//! Panel extensions reach the host only through their [`CapabilityBundle`].
//!
//! # Example
//!
//! ```rust,no_run
//! use docplus_sdk::extensions::{CapabilityBundle, ChatOptions, PanelExtension, PanelView};
//! use docplus_core::ChatMessage;
//!
//! struct Summarizer { /* descriptor */ }
//!
//! #[async_trait::async_trait]
//! impl PanelExtension for Summarizer {
//!     # fn descriptor(&self) -> &docplus_sdk::extensions::ExtensionDescriptor { todo!() }
//!     async fn render(&self, api: &CapabilityBundle) -> anyhow::Result<PanelView> {
//!         let text = api.ai().truncate_content(api.content().document_content());
//!         let summary = api
//!             .ai()
//!             .chat_stream(vec![ChatMessage::user(text)], ChatOptions::default(), |delta| {
//!                 print!("{delta}");
//!             })
//!             .await?;
//!         api.storage().set("last-summary", &summary)?;
//!         Ok(serde_json::json!({ "summary": summary }))
//!     }
//! }
//! ```

pub mod bridge;
pub mod capability;
pub mod events;
pub mod manifest;
pub mod registry;
pub mod services;
pub mod storage;
pub mod supervisor;
mod types;

// Re-export public types
pub use types::{
    ContentSnapshot, ExtensionCategory, ExtensionDescriptor, ExtensionPhase,
    ExtensionRuntimeFailure, PanelExtension, PanelView, SlotView,
};

pub use bridge::{ChatBridge, StreamPhase, ThinkingChannel};
pub use capability::{
    AiApi, CAPABILITY_API_VERSION, CapabilityBundle, CapabilityFactory, ChatOptions, ContentApi,
    DocDataApi, EventsApi, PlatformApi, TRUNCATION_MARKER, UiApi,
};
pub use events::{EventBus, EventCallback, HostEvent, Subscription, callback};
pub use manifest::{ManifestError, ManifestStore, PluginManifest};
pub use registry::{ExtensionRegistry, RegisteredExtension};
pub use services::{
    AiSettingsAccessor, ConfigSource, DocumentDataStore, FileDialogOptions, HeadlessUi,
    HostServices, KeyTranslator, MemoryDocumentStore, StaticConfig, StatusLevel, Translator,
    UiPrimitives,
};
pub use storage::{NamespacedStorage, namespace_prefix};
pub use supervisor::{SlotState, Supervisor};
