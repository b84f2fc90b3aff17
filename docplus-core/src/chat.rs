//! Chat message and request types shared by the AI transport and the
//! extension-facing AI capability.

use serde::{Deserialize, Serialize};

/// Role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in a conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Outbound generation request handed to an [`AiTransport`](crate::AiTransport).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Ordered conversation, system directive first when present
    pub messages: Vec<ChatMessage>,
    /// Model override (falls back to the configured model)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether the provider should stream chunks
    pub stream: bool,
    /// Ask reasoning-capable providers to emit a thinking span
    pub enable_thinking: bool,
    /// Ask the provider to ground the answer with web search
    pub enable_web_search: bool,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }
}

/// AI provider settings as seen by the extension host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// Provider name (openai, anthropic, deepseek, ...)
    pub provider: String,
    /// API credential
    pub api_key: Option<String>,
    /// Model identifier
    pub model: Option<String>,
    /// Custom endpoint
    pub base_url: Option<String>,
    /// System directive prefixed to extension conversations
    pub role_prompt: Option<String>,
    /// Maximum characters of document content sent to the model (0 = unlimited)
    pub max_content_length: usize,
    /// Default for reasoning output on capable providers
    pub enable_thinking: bool,
}

impl AiSettings {
    /// True iff a provider, credential and model are all configured.
    pub fn is_configured(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        !self.provider.trim().is_empty() && filled(&self.api_key) && filled(&self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_serialization() {
        let msg = ChatMessage::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");
    }

    #[test]
    fn test_ai_settings_configured() {
        let mut settings = AiSettings {
            provider: "openai".into(),
            api_key: Some("sk-test".into()),
            model: Some("gpt-4.1".into()),
            ..Default::default()
        };
        assert!(settings.is_configured());

        settings.model = Some("  ".into());
        assert!(!settings.is_configured());

        settings.model = Some("gpt-4.1".into());
        settings.api_key = None;
        assert!(!settings.is_configured());
    }
}
