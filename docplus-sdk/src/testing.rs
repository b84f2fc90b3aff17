//! Test doubles for the host interfaces.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docplus_core::{
    AiTransport, ChatRequest, ChunkHub, CommandTransport, Error, MessageRole, Result, StreamChunk,
};
use serde_json::{Value, json};

use crate::extensions::{
    CapabilityBundle, ExtensionCategory, ExtensionDescriptor, ExtensionPhase, FileDialogOptions,
    HostServices, PanelExtension, PanelView, StatusLevel, Translator, UiPrimitives,
};

// ─────────────────────────────────────────────────────────────────────────────
// AI transport
// ─────────────────────────────────────────────────────────────────────────────

/// What the scripted transport answers
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Publish each chunk, then resolve with their concatenation
    Chunks(Vec<String>),
    /// Publish each chunk, then fail with a transport error
    ChunksThenError(Vec<String>, String),
    /// Resolve with the text without publishing chunks
    Text(String),
    /// Stream the last user message back word by word
    EchoPrompt,
    /// Never resolve
    Hang,
}

impl ScriptedReply {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Chunks(chunks.into_iter().map(Into::into).collect())
    }
}

/// AI transport replaying a script through the chunk hub
pub struct ScriptedAiTransport {
    hub: Arc<ChunkHub>,
    reply: ScriptedReply,
    foreign: Option<StreamChunk>,
    requests: Mutex<Vec<ChatRequest>>,
    stream_calls: AtomicUsize,
}

impl ScriptedAiTransport {
    pub fn new(hub: Arc<ChunkHub>) -> Self {
        Self {
            hub,
            reply: ScriptedReply::Text(String::new()),
            foreign: None,
            requests: Mutex::new(Vec::new()),
            stream_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_reply(mut self, reply: ScriptedReply) -> Self {
        self.reply = reply;
        self
    }

    /// Also publish a chunk for an unrelated request before streaming
    pub fn with_foreign_chunk(mut self, request_id: &str, content: &str) -> Self {
        self.foreign = Some(StreamChunk::new(request_id, content));
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    async fn publish_all(&self, request_id: &str, chunks: &[String]) {
        for chunk in chunks {
            self.hub.publish(StreamChunk::new(request_id, chunk.clone()));
            tokio::task::yield_now().await;
        }
    }
}

fn last_user_message(request: &ChatRequest) -> String {
    request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

#[async_trait]
impl AiTransport for ScriptedAiTransport {
    async fn chat(&self, request: ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            ScriptedReply::Chunks(chunks) => Ok(chunks.concat()),
            ScriptedReply::ChunksThenError(_, message) => Err(Error::transport(message.clone())),
            ScriptedReply::Text(text) => Ok(text.clone()),
            ScriptedReply::EchoPrompt => Ok(last_user_message(&request)),
            ScriptedReply::Hang => std::future::pending().await,
        }
    }

    async fn chat_stream(&self, request: ChatRequest, request_id: &str) -> Result<String> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(foreign) = &self.foreign {
            self.hub.publish(foreign.clone());
        }

        match &self.reply {
            ScriptedReply::Chunks(chunks) => {
                self.publish_all(request_id, chunks).await;
                Ok(chunks.concat())
            }
            ScriptedReply::ChunksThenError(chunks, message) => {
                self.publish_all(request_id, chunks).await;
                Err(Error::transport(message.clone()))
            }
            ScriptedReply::Text(text) => Ok(text.clone()),
            ScriptedReply::EchoPrompt => {
                let prompt = last_user_message(&request);
                let chunks: Vec<String> = prompt.split_inclusive(' ').map(str::to_string).collect();
                self.publish_all(request_id, &chunks).await;
                Ok(prompt)
            }
            ScriptedReply::Hang => std::future::pending().await,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command transport
// ─────────────────────────────────────────────────────────────────────────────

/// Command transport that counts calls and echoes its input
#[derive(Default)]
pub struct CountingCommandTransport {
    calls: AtomicUsize,
}

impl CountingCommandTransport {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandTransport for CountingCommandTransport {
    async fn invoke(&self, name: &str, args: Value) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "command": name, "args": args }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UI and translations
// ─────────────────────────────────────────────────────────────────────────────

/// UI that records what extensions asked for
#[derive(Default)]
pub struct RecordingUi {
    statuses: Mutex<Vec<(String, StatusLevel)>>,
    clipboard: Mutex<Option<String>>,
}

impl RecordingUi {
    pub fn statuses(&self) -> Vec<(String, StatusLevel)> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn clipboard(&self) -> Option<String> {
        self.clipboard.lock().unwrap().clone()
    }
}

#[async_trait]
impl UiPrimitives for RecordingUi {
    fn show_status(&self, message: &str, level: StatusLevel) {
        self.statuses
            .lock()
            .unwrap()
            .push((message.to_string(), level));
    }

    async fn copy_to_clipboard(&self, text: &str) -> Result<()> {
        *self.clipboard.lock().unwrap() = Some(text.to_string());
        Ok(())
    }

    async fn save_file_dialog(&self, options: FileDialogOptions) -> Result<Option<PathBuf>> {
        Ok(options.default_path)
    }

    async fn open_file_dialog(&self, _options: FileDialogOptions) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    fn locale(&self) -> String {
        "zh-CN".into()
    }

    fn theme(&self) -> String {
        "dark".into()
    }
}

/// Translator returning the fully qualified key
pub struct RecordingTranslator;

impl Translator for RecordingTranslator {
    fn translate(&self, key: &str, _params: &BTreeMap<String, String>) -> String {
        key.to_string()
    }
}

/// Services over a scripted AI transport and a counting command transport
pub fn services(reply: ScriptedReply) -> (HostServices, Arc<ScriptedAiTransport>, Arc<CountingCommandTransport>) {
    let hub = ChunkHub::new();
    let ai = Arc::new(ScriptedAiTransport::new(hub.clone()).with_reply(reply));
    let commands = Arc::new(CountingCommandTransport::default());
    let services = HostServices::new(ai.clone(), commands.clone(), hub);
    (services, ai, commands)
}

// ─────────────────────────────────────────────────────────────────────────────
// Extensions
// ─────────────────────────────────────────────────────────────────────────────

/// How a hook misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Error,
    Panic,
    /// Never resolves
    Hang,
}

/// Panel extension that records hook calls and fails on demand
pub struct TestExtension {
    descriptor: ExtensionDescriptor,
    faults: Mutex<HashMap<ExtensionPhase, Fault>>,
    calls: Mutex<Vec<ExtensionPhase>>,
    document_changes: Mutex<Vec<Option<String>>>,
}

impl TestExtension {
    pub fn new(id: &str, category: ExtensionCategory) -> Self {
        Self {
            descriptor: ExtensionDescriptor::new(id, id, category),
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            document_changes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fault(self, phase: ExtensionPhase, fault: Fault) -> Self {
        self.set_fault(phase, Some(fault));
        self
    }

    pub fn set_fault(&self, phase: ExtensionPhase, fault: Option<Fault>) {
        let mut faults = self.faults.lock().unwrap();
        match fault {
            Some(fault) => faults.insert(phase, fault),
            None => faults.remove(&phase),
        };
    }

    pub fn calls(&self, phase: ExtensionPhase) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| **p == phase)
            .count()
    }

    pub fn document_changes(&self) -> Vec<Option<String>> {
        self.document_changes.lock().unwrap().clone()
    }

    async fn enter(&self, phase: ExtensionPhase) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(phase);
        let fault = self.faults.lock().unwrap().get(&phase).copied();
        match fault {
            Some(Fault::Error) => anyhow::bail!("{} failed in {}", self.descriptor.id, phase),
            Some(Fault::Panic) => panic!("{} panicked in {}", self.descriptor.id, phase),
            Some(Fault::Hang) => std::future::pending().await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PanelExtension for TestExtension {
    fn descriptor(&self) -> &ExtensionDescriptor {
        &self.descriptor
    }

    async fn render(&self, api: &CapabilityBundle) -> anyhow::Result<PanelView> {
        self.enter(ExtensionPhase::Render).await?;
        Ok(json!({
            "extensionId": api.extension_id(),
            "documentId": api.content().document_id(),
            "fragments": api.content().fragments().keys().collect::<Vec<_>>(),
        }))
    }

    async fn on_activate(&self, _api: &CapabilityBundle) -> anyhow::Result<()> {
        self.enter(ExtensionPhase::Activate).await
    }

    async fn on_deactivate(&self, _api: &CapabilityBundle) -> anyhow::Result<()> {
        self.enter(ExtensionPhase::Deactivate).await
    }

    async fn on_document_change(
        &self,
        _api: &CapabilityBundle,
        document_id: Option<&str>,
    ) -> anyhow::Result<()> {
        self.document_changes
            .lock()
            .unwrap()
            .push(document_id.map(str::to_string));
        self.enter(ExtensionPhase::DocumentChange).await
    }
}
