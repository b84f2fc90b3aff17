//! Capability Factory
//!
//! Builds the per-extension [`CapabilityBundle`], the only surface through
//! which extension code reaches the host. A bundle is built fresh for each
//! (extension, document, content snapshot) and is never shared between
//! extensions.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use docplus_core::{ChatMessage, ChatRequest, CommandGate, Result};
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::bridge::{ChatBridge, ThinkingChannel};
use super::events::{EventBus, EventCallback, HostEvent, Subscription};
use super::services::{
    AiSettingsAccessor, ConfigSource, DocumentDataStore, FileDialogOptions, HostServices,
    StatusLevel, Translator, UiPrimitives,
};
use super::storage::NamespacedStorage;
use super::types::{ContentSnapshot, ExtensionCategory, ExtensionDescriptor};

/// Version of the capability surface handed to extensions
pub const CAPABILITY_API_VERSION: u32 = 1;

/// Appended to content cut by [`AiApi::truncate_content`]
pub const TRUNCATION_MARKER: &str = "\n\n...(content truncated)";

/// Builds capability bundles
pub struct CapabilityFactory {
    gate: Arc<CommandGate>,
    bridge: Arc<ChatBridge>,
    events: Arc<EventBus>,
    services: HostServices,
    ai_settings: AiSettingsAccessor,
    thinking: Mutex<HashMap<String, ThinkingChannel>>,
}

impl CapabilityFactory {
    pub fn new(
        gate: Arc<CommandGate>,
        bridge: Arc<ChatBridge>,
        events: Arc<EventBus>,
        services: HostServices,
        ai_settings: AiSettingsAccessor,
    ) -> Self {
        Self {
            gate,
            bridge,
            events,
            services,
            ai_settings,
            thinking: Mutex::new(HashMap::new()),
        }
    }

    /// Reasoning channel of `extension_id`, kept across bundle rebuilds
    pub fn thinking_channel(&self, extension_id: &str) -> ThinkingChannel {
        self.thinking
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(extension_id.to_string())
            .or_default()
            .clone()
    }

    /// Build the bundle for `descriptor` over `snapshot`
    pub fn build(&self, descriptor: &ExtensionDescriptor, mut snapshot: ContentSnapshot) -> CapabilityBundle {
        let id = descriptor.id.clone();
        snapshot.fragments.remove(&id);
        debug!(
            extension_id = %id,
            document_id = %snapshot.document_id,
            fragments = snapshot.fragments.len(),
            "Building capability bundle"
        );

        let doc_data = (descriptor.category == ExtensionCategory::ContentGeneration).then(|| {
            DocDataApi {
                document_id: snapshot.document_id.clone(),
                extension_id: id.clone(),
                store: self.services.documents.clone(),
            }
        });

        CapabilityBundle {
            api_version: CAPABILITY_API_VERSION,
            extension_id: id.clone(),
            content: ContentApi {
                snapshot: Arc::new(snapshot),
            },
            ai: AiApi {
                extension_id: id.clone(),
                bridge: self.bridge.clone(),
                thinking: self.thinking_channel(&id),
                settings: self.ai_settings.clone(),
            },
            storage: NamespacedStorage::new(&id, self.services.storage.clone()),
            doc_data,
            ui: UiApi {
                ui: self.services.ui.clone(),
            },
            platform: PlatformApi {
                extension_id: id.clone(),
                namespace: descriptor.i18n_namespace.clone(),
                gate: self.gate.clone(),
                config: self.services.config.clone(),
                translator: self.services.translator.clone(),
            },
            events: EventsApi {
                extension_id: id,
                bus: self.events.clone(),
            },
        }
    }
}

impl std::fmt::Debug for CapabilityFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityFactory")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bundle
// ─────────────────────────────────────────────────────────────────────────────

/// Capability-scoped API of one extension
#[derive(Clone)]
pub struct CapabilityBundle {
    api_version: u32,
    extension_id: String,
    content: ContentApi,
    ai: AiApi,
    storage: NamespacedStorage,
    doc_data: Option<DocDataApi>,
    ui: UiApi,
    platform: PlatformApi,
    events: EventsApi,
}

impl CapabilityBundle {
    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn extension_id(&self) -> &str {
        &self.extension_id
    }

    pub fn content(&self) -> &ContentApi {
        &self.content
    }

    pub fn ai(&self) -> &AiApi {
        &self.ai
    }

    pub fn storage(&self) -> &NamespacedStorage {
        &self.storage
    }

    /// Present only for content-generation extensions
    pub fn doc_data(&self) -> Option<&DocDataApi> {
        self.doc_data.as_ref()
    }

    pub fn ui(&self) -> &UiApi {
        &self.ui
    }

    pub fn platform(&self) -> &PlatformApi {
        &self.platform
    }

    pub fn events(&self) -> &EventsApi {
        &self.events
    }
}

impl std::fmt::Debug for CapabilityBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityBundle")
            .field("api_version", &self.api_version)
            .field("extension_id", &self.extension_id)
            .field("document_id", &self.content.document_id())
            .field("doc_data", &self.doc_data.is_some())
            .finish_non_exhaustive()
    }
}

/// Read-only document content
#[derive(Debug, Clone)]
pub struct ContentApi {
    snapshot: Arc<ContentSnapshot>,
}

impl ContentApi {
    pub fn document_id(&self) -> &str {
        &self.snapshot.document_id
    }

    pub fn document_title(&self) -> &str {
        &self.snapshot.document_title
    }

    pub fn document_content(&self) -> &str {
        &self.snapshot.document_content
    }

    pub fn ai_content(&self) -> &str {
        &self.snapshot.ai_content
    }

    pub fn composed_content(&self) -> &str {
        &self.snapshot.composed_content
    }

    /// Fragments published by other enabled extensions, by source id
    pub fn fragments(&self) -> &BTreeMap<String, Vec<String>> {
        &self.snapshot.fragments
    }
}

/// Per-call generation options
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Overrides the configured reasoning default
    pub enable_thinking: Option<bool>,
    pub enable_web_search: bool,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Prefix the configured role directive
    pub with_role: bool,
    pub cancel: Option<CancellationToken>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            enable_thinking: None,
            enable_web_search: false,
            temperature: None,
            max_tokens: None,
            with_role: true,
            cancel: None,
        }
    }
}

impl ChatOptions {
    pub fn without_role(mut self) -> Self {
        self.with_role = false;
        self
    }

    pub fn with_thinking(mut self, enabled: bool) -> Self {
        self.enable_thinking = Some(enabled);
        self
    }

    pub fn with_web_search(mut self) -> Self {
        self.enable_web_search = true;
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// AI access
#[derive(Clone)]
pub struct AiApi {
    extension_id: String,
    bridge: Arc<ChatBridge>,
    thinking: ThinkingChannel,
    settings: AiSettingsAccessor,
}

impl AiApi {
    fn build_request(&self, messages: Vec<ChatMessage>, options: &ChatOptions) -> ChatRequest {
        let settings = (self.settings)();
        let mut all = Vec::with_capacity(messages.len() + 1);
        if options.with_role {
            if let Some(role) = settings
                .role_prompt
                .as_deref()
                .map(str::trim)
                .filter(|role| !role.is_empty())
            {
                all.push(ChatMessage::system(role));
            }
        }
        all.extend(messages);

        ChatRequest {
            messages: all,
            model: settings.model.clone(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
            enable_thinking: options.enable_thinking.unwrap_or(settings.enable_thinking),
            enable_web_search: options.enable_web_search,
        }
    }

    /// One-shot generation returning visible content only
    pub async fn chat(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> Result<String> {
        let request = self.build_request(messages, &options);
        self.bridge.complete(request, &self.thinking).await
    }

    /// Streaming generation; `on_chunk` receives visible content deltas
    pub async fn chat_stream<F>(
        &self,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
        on_chunk: F,
    ) -> Result<String>
    where
        F: FnMut(&str) + Send,
    {
        let request = self.build_request(messages, &options);
        self.bridge
            .stream(
                &self.extension_id,
                request,
                &self.thinking,
                options.cancel.as_ref(),
                on_chunk,
            )
            .await
    }

    /// Provider, credential and model are all configured
    pub fn is_available(&self) -> bool {
        (self.settings)().is_configured()
    }

    /// Cut `text` to the configured maximum number of characters
    pub fn truncate_content(&self, text: &str) -> String {
        truncate_chars(text, (self.settings)().max_content_length)
    }

    /// Reasoning from the most recent request
    pub fn last_thinking(&self) -> String {
        self.thinking.current()
    }

    pub fn subscribe_thinking(&self) -> watch::Receiver<String> {
        self.thinking.subscribe()
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return text.to_string();
    }
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// The extension's data slot inside the active document
#[derive(Clone)]
pub struct DocDataApi {
    document_id: String,
    extension_id: String,
    store: Arc<dyn DocumentDataStore>,
}

impl DocDataApi {
    pub fn get(&self) -> Result<Option<Value>> {
        self.store.get(&self.document_id, &self.extension_id)
    }

    pub fn set(&self, value: Value) -> Result<()> {
        self.store.set(&self.document_id, &self.extension_id, value)
    }

    pub fn remove(&self) -> Result<()> {
        self.store.remove(&self.document_id, &self.extension_id)
    }
}

/// UI primitives
#[derive(Clone)]
pub struct UiApi {
    ui: Arc<dyn UiPrimitives>,
}

impl UiApi {
    pub fn show_status(&self, message: &str, level: StatusLevel) {
        self.ui.show_status(message, level);
    }

    pub async fn copy_to_clipboard(&self, text: &str) -> Result<()> {
        self.ui.copy_to_clipboard(text).await
    }

    pub async fn save_file_dialog(&self, options: FileDialogOptions) -> Result<Option<PathBuf>> {
        self.ui.save_file_dialog(options).await
    }

    pub async fn open_file_dialog(&self, options: FileDialogOptions) -> Result<Option<PathBuf>> {
        self.ui.open_file_dialog(options).await
    }

    pub fn locale(&self) -> String {
        self.ui.locale()
    }

    pub fn theme(&self) -> String {
        self.ui.theme()
    }
}

/// Commands, configuration and translations
#[derive(Clone)]
pub struct PlatformApi {
    extension_id: String,
    namespace: Option<String>,
    gate: Arc<CommandGate>,
    config: Arc<dyn ConfigSource>,
    translator: Arc<dyn Translator>,
}

impl PlatformApi {
    /// Invoke an allowlisted command
    pub async fn invoke(&self, command: &str, args: Value) -> Result<Value> {
        self.gate.invoke(&self.extension_id, command, args).await
    }

    /// Owned copy of a configuration section
    pub fn get_config(&self, section: &str) -> Option<Value> {
        self.config.section(section)
    }

    /// Translate `key`, qualified with the extension's namespace unless it
    /// already has `namespace:key` form
    pub fn t(&self, key: &str, params: &BTreeMap<String, String>) -> String {
        let qualified = match &self.namespace {
            Some(ns) if !key.contains(':') => format!("{ns}:{key}"),
            _ => key.to_string(),
        };
        self.translator.translate(&qualified, params)
    }
}

/// Event subscriptions owned by the extension
#[derive(Clone)]
pub struct EventsApi {
    extension_id: String,
    bus: Arc<EventBus>,
}

impl EventsApi {
    pub fn on(&self, event: HostEvent, callback: EventCallback) -> Subscription {
        self.bus.on_owned(event, callback, &self.extension_id)
    }

    pub fn off(&self, event: HostEvent, callback: &EventCallback) -> bool {
        self.bus.off(event, callback)
    }
}
