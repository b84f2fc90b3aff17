//! Plugin Manifests
//!
//! Persists one `manifest.json` per extension under the plugins directory:
//! `{plugins_dir}/{id}/manifest.json`. Syncing is idempotent and keeps the
//! user's `enabled` choice and the original timestamps.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use super::types::{ExtensionCategory, ExtensionDescriptor};
use crate::utils::validate_id;
use crate::{SDKError, SDKResult};

const MANIFEST_FILE: &str = "manifest.json";

/// Manifest errors
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid manifest {}: {source}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid plugin id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },
}

fn default_plugin_type() -> String {
    "external".to_string()
}

fn default_true() -> bool {
    true
}

/// On-disk plugin manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub author: String,
    #[serde(rename = "type", default = "default_plugin_type")]
    pub plugin_type: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Unix seconds
    #[serde(default)]
    pub created_at: i64,
    /// Unix seconds
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub major_category: String,
    #[serde(default)]
    pub sub_category: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,

    // Marketplace fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<String>>,
}

impl PluginManifest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
            icon: String::new(),
            author: String::new(),
            plugin_type: default_plugin_type(),
            enabled: true,
            created_at: 0,
            updated_at: 0,
            major_category: String::new(),
            sub_category: String::new(),
            category: String::new(),
            tags: Vec::new(),
            homepage: None,
            license: None,
            min_app_version: None,
            permissions: None,
            dependencies: None,
            conflicts: None,
        }
    }

    /// Manifest describing a registered extension
    pub fn from_descriptor(descriptor: &ExtensionDescriptor) -> Self {
        let mut manifest = Self::new(&descriptor.id, &descriptor.name, &descriptor.version);
        manifest.description = descriptor.description.clone();
        manifest.plugin_type = "builtin".into();
        manifest.major_category = descriptor.category.as_str().into();
        manifest
    }

    /// Extension descriptor for this manifest
    pub fn descriptor(&self) -> ExtensionDescriptor {
        ExtensionDescriptor::new(
            &self.id,
            &self.name,
            ExtensionCategory::from_major_category(&self.major_category),
        )
        .with_version(&self.version)
        .with_description(&self.description)
    }
}

/// Manifest store rooted at the plugins directory
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn manifest_path(&self, id: &str) -> SDKResult<PathBuf> {
        validate_id(id).map_err(|e| ManifestError::InvalidId {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.dir.join(id).join(MANIFEST_FILE))
    }

    async fn read(path: &Path) -> SDKResult<PluginManifest> {
        let json = fs::read_to_string(path).await?;
        serde_json::from_str(&json).map_err(|source| {
            SDKError::from(ManifestError::Invalid {
                path: path.to_path_buf(),
                source,
            })
        })
    }

    async fn write(path: &Path, manifest: &PluginManifest) -> SDKResult<()> {
        let json = serde_json::to_string_pretty(manifest)?;
        fs::write(path, json).await?;
        Ok(())
    }

    /// Write manifests to disk, keeping `enabled` and timestamps of existing ones
    pub async fn sync(&self, manifests: Vec<PluginManifest>) -> SDKResult<usize> {
        fs::create_dir_all(&self.dir).await?;
        let now = Utc::now().timestamp();
        let mut written = 0;

        for mut manifest in manifests {
            let path = self.manifest_path(&manifest.id)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }

            match Self::read(&path).await {
                Ok(existing) => {
                    manifest.enabled = existing.enabled;
                    manifest.created_at = existing.created_at;
                    manifest.updated_at = existing.updated_at;
                }
                Err(SDKError::Io(_)) => {
                    manifest.created_at = now;
                    manifest.updated_at = now;
                }
                Err(err) => {
                    warn!(plugin_id = %manifest.id, "Replacing unreadable manifest: {}", err);
                    manifest.created_at = now;
                    manifest.updated_at = now;
                }
            }

            Self::write(&path, &manifest).await?;
            written += 1;
        }

        info!(dir = %self.dir.display(), written, "Synced plugin manifests");
        Ok(written)
    }

    /// All readable manifests, ordered by ID
    pub async fn list(&self) -> SDKResult<Vec<PluginManifest>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut manifests = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let path = entry.path().join(MANIFEST_FILE);
            if !fs::try_exists(&path).await? {
                continue;
            }
            match Self::read(&path).await {
                Ok(manifest) => manifests.push(manifest),
                Err(err) => warn!("Skipping manifest {:?}: {}", path, err),
            }
        }

        manifests.sort_by(|a, b| a.id.cmp(&b.id));
        debug!(count = manifests.len(), "Listed plugin manifests");
        Ok(manifests)
    }

    /// Manifest of `id`
    pub async fn get(&self, id: &str) -> SDKResult<PluginManifest> {
        let path = self.manifest_path(id)?;
        if !fs::try_exists(&path).await? {
            return Err(SDKError::not_found("Plugin", id));
        }
        Self::read(&path).await
    }

    /// Persist a new `enabled` state
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> SDKResult<PluginManifest> {
        let mut manifest = self.get(id).await?;
        manifest.enabled = enabled;
        manifest.updated_at = Utc::now().timestamp();
        Self::write(&self.manifest_path(id)?, &manifest).await?;
        info!(plugin_id = id, enabled, "Updated plugin state");
        Ok(manifest)
    }
}
