//! Extension Registry
//!
//! Holds the panel extensions known to the host and whether each is enabled.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use super::manifest::PluginManifest;
use super::types::{ExtensionDescriptor, PanelExtension};
use crate::utils::validate_id;
use crate::{SDKError, SDKResult};

/// A registered extension
#[derive(Clone)]
pub struct RegisteredExtension {
    pub descriptor: ExtensionDescriptor,
    pub extension: Arc<dyn PanelExtension>,
    pub enabled: bool,
}

impl std::fmt::Debug for RegisteredExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredExtension")
            .field("descriptor", &self.descriptor)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Extension registry
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: RwLock<BTreeMap<String, RegisteredExtension>>,
}

impl ExtensionRegistry {
    /// Create a new extension registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension, enabled
    pub async fn register(&self, extension: Arc<dyn PanelExtension>) -> SDKResult<()> {
        let descriptor = extension.descriptor().clone();
        validate_id(&descriptor.id)
            .map_err(|e| SDKError::extension(format!("{}: {}", descriptor.id, e)))?;

        let mut extensions = self.extensions.write().await;
        if extensions.contains_key(&descriptor.id) {
            return Err(SDKError::already_registered("Extension", &descriptor.id));
        }

        debug!(extension_id = %descriptor.id, category = %descriptor.category, "Registered extension");
        extensions.insert(
            descriptor.id.clone(),
            RegisteredExtension {
                descriptor,
                extension,
                enabled: true,
            },
        );
        Ok(())
    }

    /// Unregister an extension
    pub async fn unregister(&self, extension_id: &str) -> SDKResult<RegisteredExtension> {
        let mut extensions = self.extensions.write().await;
        extensions
            .remove(extension_id)
            .ok_or_else(|| SDKError::not_found("Extension", extension_id))
    }

    /// Get extension by ID
    pub async fn get(&self, extension_id: &str) -> Option<RegisteredExtension> {
        let extensions = self.extensions.read().await;
        extensions.get(extension_id).cloned()
    }

    /// List all extensions, ordered by ID
    pub async fn list(&self) -> Vec<ExtensionDescriptor> {
        let extensions = self.extensions.read().await;
        extensions.values().map(|e| e.descriptor.clone()).collect()
    }

    /// Enable or disable an extension
    pub async fn set_enabled(&self, extension_id: &str, enabled: bool) -> SDKResult<()> {
        let mut extensions = self.extensions.write().await;
        let extension = extensions
            .get_mut(extension_id)
            .ok_or_else(|| SDKError::not_found("Extension", extension_id))?;
        extension.enabled = enabled;
        info!(extension_id, enabled, "Extension state changed");
        Ok(())
    }

    /// IDs of enabled extensions
    pub async fn enabled_ids(&self) -> Vec<String> {
        let extensions = self.extensions.read().await;
        extensions
            .values()
            .filter(|e| e.enabled)
            .map(|e| e.descriptor.id.clone())
            .collect()
    }

    /// Adopt the `enabled` flags recorded in manifests.
    ///
    /// Manifests for unregistered extensions are ignored. Returns how many
    /// extensions were updated.
    pub async fn apply_manifests(&self, manifests: &[PluginManifest]) -> usize {
        let mut extensions = self.extensions.write().await;
        let mut applied = 0;
        for manifest in manifests {
            if let Some(extension) = extensions.get_mut(&manifest.id) {
                extension.enabled = manifest.enabled;
                applied += 1;
            }
        }
        applied
    }
}
