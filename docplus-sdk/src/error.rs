//! SDK Error Types
//!
//! Defines error types for the DocPlus SDK.

use thiserror::Error;

/// SDK Result type alias
pub type SDKResult<T> = Result<T, SDKError>;

/// SDK errors
#[derive(Debug, Error)]
pub enum SDKError {
    /// Error raised by a core component (gate, transport, storage backend)
    #[error(transparent)]
    Core(#[from] docplus_core::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    /// Plugin manifest error
    #[error("manifest error: {0}")]
    Manifest(#[from] crate::extensions::ManifestError),

    /// Extension error
    #[error("extension error: {message}")]
    Extension { message: String },

    /// Entry not found
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    /// Entry already registered
    #[error("{entity_type} already registered: {id}")]
    AlreadyRegistered { entity_type: String, id: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SDKError {
    /// Create an extension error
    pub fn extension(message: impl Into<String>) -> Self {
        Self::Extension {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create an already registered error
    pub fn already_registered(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyRegistered {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Check if this error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if a command was rejected by the allowlist
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_permission_denied())
    }

    /// Check if the operation was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_cancelled())
    }

    /// Check if a transport failed
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_transport())
    }

    /// Check if a storage key was rejected
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, Self::Core(docplus_core::Error::InvalidKey(_)))
    }
}
