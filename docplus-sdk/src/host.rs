//! Extension Host
//!
//! Composition root: validates configuration and wires the allowlist gate,
//! event bus, chat bridge, capability factory, registry and supervisor
//! around the services supplied by the host application.

use std::sync::Arc;

use docplus_core::{CommandAllowlist, CommandGate, KeyValueBackend, MemoryBackend};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{HostConfig, StorageConfig};
use crate::extensions::{
    AiSettingsAccessor, CapabilityFactory, ChatBridge, EventBus, ExtensionRegistry, HostEvent,
    HostServices, ManifestStore, PanelExtension, PluginManifest, Supervisor,
};
use crate::SDKResult;

/// Main extension host entry point
pub struct ExtensionHost {
    config: HostConfig,
    allowlist: Arc<CommandAllowlist>,
    events: Arc<EventBus>,
    bridge: Arc<ChatBridge>,
    factory: Arc<CapabilityFactory>,
    registry: Arc<ExtensionRegistry>,
    supervisor: Arc<Supervisor>,
    manifests: ManifestStore,
}

impl ExtensionHost {
    /// Create a new extension host
    pub fn new(config: HostConfig, services: HostServices) -> SDKResult<Self> {
        config.validate()?;

        let allowlist = Arc::new(config.commands.allowlist());
        let gate = Arc::new(CommandGate::new(
            allowlist.clone(),
            services.commands.clone(),
        ));
        let events = EventBus::new();
        let bridge = Arc::new(
            ChatBridge::new(services.ai.clone(), services.chunks.clone())
                .with_max_buffer_bytes(config.stream.max_buffer_bytes),
        );

        let ai_settings: AiSettingsAccessor = match services.ai_settings.clone() {
            Some(accessor) => accessor,
            None => {
                let settings = config.ai.clone();
                Arc::new(move || settings.clone())
            }
        };

        let factory = Arc::new(CapabilityFactory::new(
            gate,
            bridge.clone(),
            events.clone(),
            services,
            ai_settings,
        ));
        let registry = Arc::new(ExtensionRegistry::new());
        let supervisor = Arc::new(Supervisor::new(
            registry.clone(),
            factory.clone(),
            events.clone(),
        ));
        let manifests = ManifestStore::new(&config.plugins_dir);

        info!(
            commands = allowlist.len(),
            plugins_dir = %config.plugins_dir.display(),
            "Extension host ready"
        );

        Ok(Self {
            config,
            allowlist,
            events,
            bridge,
            factory,
            registry,
            supervisor,
            manifests,
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn allowlist(&self) -> &CommandAllowlist {
        &self.allowlist
    }

    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    pub fn bridge(&self) -> &Arc<ChatBridge> {
        &self.bridge
    }

    pub fn factory(&self) -> &Arc<CapabilityFactory> {
        &self.factory
    }

    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    /// Register an extension
    pub async fn register(&self, extension: Arc<dyn PanelExtension>) -> SDKResult<()> {
        self.registry.register(extension).await
    }

    /// Write manifests for registered extensions and adopt the stored
    /// `enabled` flags. Returns how many extensions were updated.
    pub async fn sync_manifests(&self) -> SDKResult<usize> {
        let manifests: Vec<PluginManifest> = self
            .registry
            .list()
            .await
            .iter()
            .map(PluginManifest::from_descriptor)
            .collect();
        self.manifests.sync(manifests).await?;

        let stored = self.manifests.list().await?;
        Ok(self.registry.apply_manifests(&stored).await)
    }

    /// Emit a host event to extension subscribers
    pub fn notify(&self, event: HostEvent, payload: &Value) -> usize {
        debug!(event = %event, "Host notification");
        self.events.emit(event, payload)
    }

    /// Cancel one streaming request, or every one when `request_id` is `None`
    pub fn stop_stream(&self, request_id: Option<&str>) -> usize {
        self.bridge.stop(request_id)
    }
}

impl std::fmt::Debug for ExtensionHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionHost")
            .field("plugins_dir", &self.config.plugins_dir)
            .field("allowlist", &self.allowlist)
            .finish_non_exhaustive()
    }
}

/// Open the storage backend described by `config`.
///
/// Without a database path, storage lives in memory.
#[cfg(feature = "sqlite")]
pub fn open_storage(config: &StorageConfig) -> SDKResult<Arc<dyn KeyValueBackend>> {
    match &config.database_path {
        Some(path) => Ok(Arc::new(docplus_core::SqliteBackend::open(path)?)),
        None => Ok(Arc::new(MemoryBackend::new())),
    }
}

/// Open the storage backend described by `config`.
///
/// Without the `sqlite` feature only in-memory storage is available.
#[cfg(not(feature = "sqlite"))]
pub fn open_storage(config: &StorageConfig) -> SDKResult<Arc<dyn KeyValueBackend>> {
    match &config.database_path {
        Some(_) => Err(crate::ConfigValidationError::InvalidValue {
            field: "storage.database_path".into(),
            message: "built without sqlite support".into(),
        }
        .into()),
        None => Ok(Arc::new(MemoryBackend::new())),
    }
}
