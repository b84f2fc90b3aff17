//! Configuration management for docplus.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (DOCPLUS_*)
//! 2. Config file (~/.docplus/config.toml)
//! 3. Default values

use anyhow::{Context, Result};
use docplus_sdk::HostConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// CLI configuration: the host configuration plus where it came from
#[derive(Debug, Clone)]
pub struct Config {
    /// Extension host settings
    pub host: HostConfig,

    /// Base directory for docplus data
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".docplus")
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            host: defaults_for(&data_dir),
            data_dir,
        }
    }
}

/// Host configuration rooted at `data_dir`
fn defaults_for(data_dir: &Path) -> HostConfig {
    HostConfig::new(data_dir.join("plugins")).with_database(data_dir.join("storage.db"))
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        let data_dir = default_data_dir();

        let host = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            Self::parse(&content, &data_dir).context("Failed to parse config file")?
        } else {
            defaults_for(&data_dir)
        };

        let mut config = Config { host, data_dir };
        config.apply_env(|name| std::env::var(name).ok());
        debug!(
            config_path = %config_path.display(),
            plugins_dir = %config.host.plugins_dir.display(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse a TOML document, filling unset locations from `data_dir`.
    pub fn parse(content: &str, data_dir: &Path) -> Result<HostConfig> {
        let table: toml::Table = toml::from_str(content)?;
        let plugins_dir_set = table.contains_key("plugins_dir");
        let database_set = table
            .get("storage")
            .and_then(|storage| storage.get("database_path"))
            .is_some();

        let mut host: HostConfig = toml::Value::Table(table).try_into()?;
        let defaults = defaults_for(data_dir);
        if !plugins_dir_set {
            host.plugins_dir = defaults.plugins_dir;
        }
        if !database_set {
            host.storage.database_path = defaults.storage.database_path;
        }
        Ok(host)
    }

    /// Apply DOCPLUS_* overrides read through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("DOCPLUS_PLUGINS_DIR").filter(|v| !v.is_empty()) {
            self.host.plugins_dir = PathBuf::from(dir);
        }
        if let Some(path) = var("DOCPLUS_DATABASE_PATH").filter(|v| !v.is_empty()) {
            self.host.storage.database_path = Some(PathBuf::from(path));
        }
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("DOCPLUS_CONFIG") {
            PathBuf::from(path)
        } else {
            default_data_dir().join("config.toml")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docplus_sdk::DEFAULT_MAX_BUFFER_BYTES;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.host.plugins_dir.ends_with("plugins"));
        assert!(config.host.plugins_dir.starts_with(&config.data_dir));
        assert_eq!(
            config.host.storage.database_path,
            Some(config.data_dir.join("storage.db"))
        );
        assert!(config.host.commands.allowed.is_none());
        assert!(config.host.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_file_uses_data_dir() {
        let temp = tempdir().expect("Failed to create temp dir");
        let host = Config::parse("", temp.path()).unwrap();

        assert_eq!(host.plugins_dir, temp.path().join("plugins"));
        assert_eq!(
            host.storage.database_path,
            Some(temp.path().join("storage.db"))
        );
        assert_eq!(host.stream.max_buffer_bytes, DEFAULT_MAX_BUFFER_BYTES);
    }

    #[test]
    fn test_parse_full_file() {
        let temp = tempdir().expect("Failed to create temp dir");
        let content = r#"
plugins_dir = "/opt/docplus/plugins"

[ai]
provider = "deepseek"
api_key = "sk-test"
model = "deepseek-reasoner"
role_prompt = "You are a careful editor."
max_content_length = 8000
enable_thinking = true

[commands]
allowed = ["read_file", "list_documents"]

[stream]
max_buffer_bytes = 4096

[storage]
database_path = "/var/lib/docplus/storage.db"
"#;

        let host = Config::parse(content, temp.path()).unwrap();

        assert_eq!(host.plugins_dir, PathBuf::from("/opt/docplus/plugins"));
        assert!(host.ai.is_configured());
        assert!(host.ai.enable_thinking);
        assert_eq!(host.ai.max_content_length, 8000);
        assert_eq!(
            host.commands.allowlist().names(),
            vec!["list_documents", "read_file"]
        );
        assert_eq!(host.stream.max_buffer_bytes, 4096);
        assert_eq!(
            host.storage.database_path,
            Some(PathBuf::from("/var/lib/docplus/storage.db"))
        );
    }

    #[test]
    fn test_parse_rejects_malformed_toml() {
        let temp = tempdir().expect("Failed to create temp dir");
        assert!(Config::parse("plugins_dir = [", temp.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        let env: HashMap<&str, &str> = [
            ("DOCPLUS_PLUGINS_DIR", "/tmp/docplus-plugins"),
            ("DOCPLUS_DATABASE_PATH", "/tmp/docplus.db"),
        ]
        .into_iter()
        .collect();

        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.host.plugins_dir, PathBuf::from("/tmp/docplus-plugins"));
        assert_eq!(
            config.host.storage.database_path,
            Some(PathBuf::from("/tmp/docplus.db"))
        );
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = Config::default();
        let before = config.host.plugins_dir.clone();

        config.apply_env(|_| Some(String::new()));

        assert_eq!(config.host.plugins_dir, before);
    }
}
