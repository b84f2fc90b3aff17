//! Host Configuration
//!
//! Defines configuration options for the DocPlus extension host.

use docplus_core::{AiSettings, CommandAllowlist, DEFAULT_ALLOWED_COMMANDS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default cap on the raw text accumulated by one streaming call (10 MiB)
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 10 * 1024 * 1024;

/// Extension host configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// AI provider settings seen by extensions
    pub ai: AiSettings,

    /// Command allowlist configuration
    pub commands: CommandsConfig,

    /// Streaming configuration
    pub stream: StreamConfig,

    /// Extension storage configuration
    pub storage: StorageConfig,

    /// Directory holding `{id}/manifest.json` for each extension
    pub plugins_dir: PathBuf,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            ai: AiSettings::default(),
            commands: CommandsConfig::default(),
            stream: StreamConfig::default(),
            storage: StorageConfig::default(),
            plugins_dir: PathBuf::from("plugins"),
        }
    }
}

/// Command allowlist configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Allowed command names (default: the built-in allowlist)
    pub allowed: Option<Vec<String>>,
}

impl CommandsConfig {
    /// Build the immutable allowlist for this configuration
    pub fn allowlist(&self) -> CommandAllowlist {
        match &self.allowed {
            Some(names) => CommandAllowlist::new(names.iter().cloned()),
            None => CommandAllowlist::new(DEFAULT_ALLOWED_COMMANDS.iter().copied()),
        }
    }
}

/// Streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Maximum raw bytes accumulated per streaming call (default: 10 MiB)
    pub max_buffer_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
        }
    }
}

/// Extension storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database for extension storage (in-memory when unset)
    pub database_path: Option<PathBuf>,
}

impl HostConfig {
    /// Create a new host config with the given plugins directory
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            ..Default::default()
        }
    }

    /// Set AI settings
    pub fn with_ai(mut self, ai: AiSettings) -> Self {
        self.ai = ai;
        self
    }

    /// Replace the command allowlist
    pub fn with_allowed_commands<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.allowed = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Set the streaming buffer cap
    pub fn with_max_buffer_bytes(mut self, max_buffer_bytes: usize) -> Self {
        self.stream.max_buffer_bytes = max_buffer_bytes;
        self
    }

    /// Set the storage database path
    pub fn with_database(mut self, database_path: impl Into<PathBuf>) -> Self {
        self.storage.database_path = Some(database_path.into());
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.plugins_dir.as_os_str().is_empty() {
            return Err(ConfigValidationError::MissingPluginsDir);
        }

        if self.stream.max_buffer_bytes == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "stream.max_buffer_bytes".into(),
                message: "must be greater than 0".into(),
            });
        }

        if let Some(names) = &self.commands.allowed {
            if let Some(bad) = names
                .iter()
                .find(|n| n.trim().is_empty() || n.chars().any(char::is_whitespace))
            {
                return Err(ConfigValidationError::InvalidValue {
                    field: "commands.allowed".into(),
                    message: format!("invalid command name {bad:?}"),
                });
            }
        }

        if self
            .storage
            .database_path
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(ConfigValidationError::InvalidValue {
                field: "storage.database_path".into(),
                message: "must not be empty".into(),
            });
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("plugins_dir is required")]
    MissingPluginsDir,

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();
        assert_eq!(config.stream.max_buffer_bytes, 10 * 1024 * 1024);
        assert!(config.commands.allowed.is_none());
        assert_eq!(
            config.commands.allowlist().len(),
            DEFAULT_ALLOWED_COMMANDS.len()
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = HostConfig::new("/tmp/plugins")
            .with_allowed_commands(["read_file", "get_temp_dir"])
            .with_max_buffer_bytes(1024)
            .with_database("/tmp/storage.db");

        assert_eq!(config.plugins_dir, PathBuf::from("/tmp/plugins"));
        assert_eq!(
            config.commands.allowlist().names(),
            vec!["get_temp_dir", "read_file"]
        );
        assert_eq!(config.stream.max_buffer_bytes, 1024);
        assert_eq!(
            config.storage.database_path,
            Some(PathBuf::from("/tmp/storage.db"))
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = HostConfig::default();
        assert!(config.validate().is_ok());

        config.stream.max_buffer_bytes = 0;
        assert!(config.validate().is_err());

        config.stream.max_buffer_bytes = 1;
        config.commands.allowed = Some(vec!["read file".into()]);
        assert!(config.validate().is_err());

        config.commands.allowed = None;
        config.plugins_dir = PathBuf::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::MissingPluginsDir)
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: HostConfig =
            serde_json::from_str(r#"{ "ai": { "provider": "openai" } }"#).unwrap();
        assert_eq!(config.ai.provider, "openai");
        assert_eq!(config.stream.max_buffer_bytes, DEFAULT_MAX_BUFFER_BYTES);
        assert_eq!(config.plugins_dir, PathBuf::from("plugins"));
    }
}
