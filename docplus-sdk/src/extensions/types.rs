//! Extension Type Definitions

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::capability::CapabilityBundle;

/// What an extension produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtensionCategory {
    /// Generates document content; gets a per-document data slot
    ContentGeneration,
    /// Tools that act on documents without owning content
    Functional,
}

impl ExtensionCategory {
    /// Map a manifest `majorCategory` value to a category.
    ///
    /// Unknown values are treated as functional.
    pub fn from_major_category(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "content-generation" | "content_generation" | "content" | "generation" => {
                Self::ContentGeneration
            }
            _ => Self::Functional,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentGeneration => "content-generation",
            Self::Functional => "functional",
        }
    }
}

impl std::fmt::Display for ExtensionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of a panel extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionDescriptor {
    /// Unique extension ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Extension category
    pub category: ExtensionCategory,
    /// Translation namespace for `platform.t`
    pub i18n_namespace: Option<String>,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
}

impl ExtensionDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: ExtensionCategory) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            i18n_namespace: None,
            version: "0.1.0".into(),
            description: String::new(),
        }
    }

    pub fn with_i18n_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.i18n_namespace = Some(namespace.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Opaque view model an extension renders into its panel
pub type PanelView = serde_json::Value;

/// A panel extension.
///
/// Hooks receive the extension's capability bundle and nothing else. Errors
/// and panics raised from any hook are contained by the supervisor.
#[async_trait]
pub trait PanelExtension: Send + Sync {
    fn descriptor(&self) -> &ExtensionDescriptor;

    async fn render(&self, api: &CapabilityBundle) -> anyhow::Result<PanelView>;

    /// Called when the extension is mounted
    async fn on_activate(&self, _api: &CapabilityBundle) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when the extension is unmounted or switched away from
    async fn on_deactivate(&self, _api: &CapabilityBundle) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when the active document changes while mounted
    async fn on_document_change(
        &self,
        _api: &CapabilityBundle,
        _document_id: Option<&str>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Document content visible to the active extension
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentSnapshot {
    pub document_id: String,
    pub document_title: String,
    /// Editor body
    pub document_content: String,
    /// AI-generated content of the document
    pub ai_content: String,
    /// Composed output of the document
    pub composed_content: String,
    /// Markdown fragments published by extensions, grouped by source id
    pub fragments: BTreeMap<String, Vec<String>>,
}

impl ContentSnapshot {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.document_title = title.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.document_content = content.into();
        self
    }

    pub fn with_ai_content(mut self, content: impl Into<String>) -> Self {
        self.ai_content = content.into();
        self
    }

    pub fn with_composed_content(mut self, content: impl Into<String>) -> Self {
        self.composed_content = content.into();
        self
    }

    pub fn with_fragment(mut self, source_id: impl Into<String>, markdown: impl Into<String>) -> Self {
        self.fragments
            .entry(source_id.into())
            .or_default()
            .push(markdown.into());
        self
    }
}

/// Hook during which an extension failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionPhase {
    Activate,
    Render,
    DocumentChange,
    Deactivate,
}

impl std::fmt::Display for ExtensionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Activate => "activate",
            Self::Render => "render",
            Self::DocumentChange => "document_change",
            Self::Deactivate => "deactivate",
        };
        f.write_str(name)
    }
}

/// A contained extension failure held in the panel slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionRuntimeFailure {
    pub extension_id: String,
    pub phase: ExtensionPhase,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ExtensionRuntimeFailure {
    pub fn new(extension_id: impl Into<String>, phase: ExtensionPhase, message: impl Into<String>) -> Self {
        Self {
            extension_id: extension_id.into(),
            phase,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// What the panel slot shows
#[derive(Debug, Clone, PartialEq)]
pub enum SlotView {
    /// No extension is active
    Empty,
    /// The active extension rendered successfully
    Rendered { extension_id: String, view: PanelView },
    /// The active extension failed; the failure replaces its panel
    Failed {
        failure: ExtensionRuntimeFailure,
        can_retry: bool,
    },
}

impl SlotView {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
