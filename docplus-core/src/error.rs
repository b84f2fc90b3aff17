//! Error types for docplus-core.

use thiserror::Error;

/// Result type alias using docplus-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for extension host operations
#[derive(Error, Debug)]
pub enum Error {
    // Authorization errors
    #[error("Permission denied: extension '{extension_id}' may not invoke '{command}' (allowed: {})", .allowed.join(", "))]
    PermissionDenied {
        extension_id: String,
        command: String,
        allowed: Vec<String>,
    },

    // Transport errors
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Request cancelled")]
    Cancelled,

    // Storage errors
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[cfg(feature = "db")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Lock poisoned")]
    LockPoisoned,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a transport failure
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(
        extension_id: impl Into<String>,
        command: impl Into<String>,
        allowed: Vec<String>,
    ) -> Self {
        Self::PermissionDenied {
            extension_id: extension_id.into(),
            command: command.into(),
            allowed,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
