//! Host Services
//!
//! Interfaces the host application implements for the extension host, and
//! the bundle of them handed to [`ExtensionHost::new`](crate::ExtensionHost::new).

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docplus_core::{
    AiSettings, AiTransport, ChunkHub, CommandTransport, Error, KeyValueBackend, MemoryBackend,
    Result,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Read-only application configuration, by section
pub trait ConfigSource: Send + Sync {
    fn section(&self, name: &str) -> Option<Value>;
}

/// Severity of a status-bar message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Options for native file dialogs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileDialogOptions {
    pub title: Option<String>,
    pub default_path: Option<PathBuf>,
    /// (label, extensions) pairs
    pub filters: Vec<(String, Vec<String>)>,
}

/// UI primitives offered to extensions
#[async_trait]
pub trait UiPrimitives: Send + Sync {
    fn show_status(&self, message: &str, level: StatusLevel);

    async fn copy_to_clipboard(&self, text: &str) -> Result<()>;

    async fn save_file_dialog(&self, options: FileDialogOptions) -> Result<Option<PathBuf>>;

    async fn open_file_dialog(&self, options: FileDialogOptions) -> Result<Option<PathBuf>>;

    fn locale(&self) -> String;

    fn theme(&self) -> String;
}

/// Translation catalog lookup
pub trait Translator: Send + Sync {
    /// Translate a fully qualified `namespace:key`, interpolating `{name}` params.
    fn translate(&self, key: &str, params: &BTreeMap<String, String>) -> String;
}

/// Per-document data slots owned by content-generation extensions
pub trait DocumentDataStore: Send + Sync {
    fn get(&self, document_id: &str, extension_id: &str) -> Result<Option<Value>>;

    fn set(&self, document_id: &str, extension_id: &str, value: Value) -> Result<()>;

    fn remove(&self, document_id: &str, extension_id: &str) -> Result<()>;
}

/// Current AI settings, read on every call
pub type AiSettingsAccessor = Arc<dyn Fn() -> AiSettings + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Headless defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    sections: BTreeMap<String, Value>,
}

impl StaticConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, name: impl Into<String>, value: Value) -> Self {
        self.sections.insert(name.into(), value);
        self
    }
}

impl ConfigSource for StaticConfig {
    fn section(&self, name: &str) -> Option<Value> {
        self.sections.get(name).cloned()
    }
}

/// Translator without catalogs: returns the key part with params interpolated
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyTranslator;

impl Translator for KeyTranslator {
    fn translate(&self, key: &str, params: &BTreeMap<String, String>) -> String {
        let text = key.split_once(':').map_or(key, |(_, rest)| rest);
        params.iter().fold(text.to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{name}}}"), value)
        })
    }
}

/// UI for hosts without a window: status goes to the log, dialogs are dismissed
#[derive(Debug, Clone)]
pub struct HeadlessUi {
    locale: String,
    theme: String,
}

impl Default for HeadlessUi {
    fn default() -> Self {
        Self {
            locale: "en".into(),
            theme: "light".into(),
        }
    }
}

#[async_trait]
impl UiPrimitives for HeadlessUi {
    fn show_status(&self, message: &str, level: StatusLevel) {
        info!(?level, "{}", message);
    }

    async fn copy_to_clipboard(&self, _text: &str) -> Result<()> {
        Err(Error::Other("clipboard is not available".into()))
    }

    async fn save_file_dialog(&self, _options: FileDialogOptions) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    async fn open_file_dialog(&self, _options: FileDialogOptions) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    fn locale(&self) -> String {
        self.locale.clone()
    }

    fn theme(&self) -> String {
        self.theme.clone()
    }
}

/// Document data slots held in memory
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    slots: Mutex<HashMap<(String, String), Value>>,
}

impl DocumentDataStore for MemoryDocumentStore {
    fn get(&self, document_id: &str, extension_id: &str) -> Result<Option<Value>> {
        let slots = self.slots.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(slots
            .get(&(document_id.to_string(), extension_id.to_string()))
            .cloned())
    }

    fn set(&self, document_id: &str, extension_id: &str, value: Value) -> Result<()> {
        let mut slots = self.slots.lock().map_err(|_| Error::LockPoisoned)?;
        slots.insert((document_id.to_string(), extension_id.to_string()), value);
        Ok(())
    }

    fn remove(&self, document_id: &str, extension_id: &str) -> Result<()> {
        let mut slots = self.slots.lock().map_err(|_| Error::LockPoisoned)?;
        slots.remove(&(document_id.to_string(), extension_id.to_string()));
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HostServices
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the host application supplies to the extension host
#[derive(Clone)]
pub struct HostServices {
    pub ai: Arc<dyn AiTransport>,
    pub commands: Arc<dyn CommandTransport>,
    pub chunks: Arc<ChunkHub>,
    pub storage: Arc<dyn KeyValueBackend>,
    pub config: Arc<dyn ConfigSource>,
    pub ui: Arc<dyn UiPrimitives>,
    pub translator: Arc<dyn Translator>,
    pub documents: Arc<dyn DocumentDataStore>,
    /// Overrides the configured AI settings when set
    pub ai_settings: Option<AiSettingsAccessor>,
}

impl HostServices {
    /// Create services with headless defaults for everything but the transports
    pub fn new(
        ai: Arc<dyn AiTransport>,
        commands: Arc<dyn CommandTransport>,
        chunks: Arc<ChunkHub>,
    ) -> Self {
        Self {
            ai,
            commands,
            chunks,
            storage: Arc::new(MemoryBackend::new()),
            config: Arc::new(StaticConfig::new()),
            ui: Arc::new(HeadlessUi::default()),
            translator: Arc::new(KeyTranslator),
            documents: Arc::new(MemoryDocumentStore::default()),
            ai_settings: None,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn KeyValueBackend>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_config(mut self, config: Arc<dyn ConfigSource>) -> Self {
        self.config = config;
        self
    }

    pub fn with_ui(mut self, ui: Arc<dyn UiPrimitives>) -> Self {
        self.ui = ui;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_documents(mut self, documents: Arc<dyn DocumentDataStore>) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_ai_settings<F>(mut self, accessor: F) -> Self
    where
        F: Fn() -> AiSettings + Send + Sync + 'static,
    {
        self.ai_settings = Some(Arc::new(accessor));
        self
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices")
            .field("chunks", &self.chunks)
            .field("ai_settings", &self.ai_settings.is_some())
            .finish_non_exhaustive()
    }
}
