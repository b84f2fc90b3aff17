//! Lifecycle & Containment Supervisor
//!
//! Owns the single panel slot. Extension hooks run on their own task so that
//! an error or a panic in extension code becomes an
//! [`ExtensionRuntimeFailure`] held in the slot instead of taking the host
//! down. A failed slot renders as [`SlotView::Failed`] until it is retried or
//! another extension is activated.
//!
//! The slot lock is never held while extension code runs. Each mount gets a
//! generation number; a hook outcome is written back only if the slot still
//! holds the generation the hook was started for.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::capability::{CapabilityBundle, CapabilityFactory};
use super::events::{EventBus, HostEvent, panic_message};
use super::registry::ExtensionRegistry;
use super::types::{
    ContentSnapshot, ExtensionDescriptor, ExtensionPhase, ExtensionRuntimeFailure,
    PanelExtension, SlotView,
};
use crate::{SDKError, SDKResult};

/// The mounted extension
struct Slot {
    generation: u64,
    descriptor: ExtensionDescriptor,
    extension: Arc<dyn PanelExtension>,
    snapshot: ContentSnapshot,
    bundle: CapabilityBundle,
    failure: Option<ExtensionRuntimeFailure>,
}

impl Slot {
    /// Everything a hook needs, detached from the slot
    fn hook_target(&self) -> HookTarget {
        HookTarget {
            generation: self.generation,
            extension_id: self.descriptor.id.clone(),
            extension: self.extension.clone(),
            bundle: self.bundle.clone(),
        }
    }
}

struct HookTarget {
    generation: u64,
    extension_id: String,
    extension: Arc<dyn PanelExtension>,
    bundle: CapabilityBundle,
}

/// Observable state of the panel slot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotState {
    pub active: Option<String>,
    pub document_id: Option<String>,
    pub failure: Option<ExtensionRuntimeFailure>,
}

/// Run an extension hook, turning errors, panics and overruns into a failure
async fn contain<T, Fut>(
    extension_id: &str,
    phase: ExtensionPhase,
    limit: Option<Duration>,
    hook: Fut,
) -> Result<T, ExtensionRuntimeFailure>
where
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let mut task = tokio::spawn(hook);
    let joined = match limit {
        Some(limit) => match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                let message = format!("{phase} timed out after {limit:?}");
                error!(extension_id, %phase, "Extension failed: {}", message);
                return Err(ExtensionRuntimeFailure::new(extension_id, phase, message));
            }
        },
        None => task.await,
    };

    let message = match joined {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(err)) => format!("{err:#}"),
        Err(join) if join.is_panic() => panic_message(join.into_panic().as_ref()),
        Err(join) => join.to_string(),
    };
    error!(extension_id, %phase, "Extension failed: {}", message);
    Err(ExtensionRuntimeFailure::new(extension_id, phase, message))
}

/// Panel lifecycle supervisor
pub struct Supervisor {
    registry: Arc<ExtensionRegistry>,
    factory: Arc<CapabilityFactory>,
    events: Arc<EventBus>,
    slot: Mutex<Option<Slot>>,
    generations: AtomicU64,
    hook_timeout: Option<Duration>,
}

impl Supervisor {
    pub fn new(
        registry: Arc<ExtensionRegistry>,
        factory: Arc<CapabilityFactory>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            registry,
            factory,
            events,
            slot: Mutex::new(None),
            generations: AtomicU64::new(0),
            hook_timeout: None,
        }
    }

    /// Fail any hook that runs longer than `timeout`
    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout = Some(timeout);
        self
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Bundle over `snapshot`, with fragments limited to enabled extensions
    async fn build_bundle(
        &self,
        descriptor: &ExtensionDescriptor,
        snapshot: &ContentSnapshot,
    ) -> CapabilityBundle {
        let enabled = self.registry.enabled_ids().await;
        let mut visible = snapshot.clone();
        visible.fragments.retain(|source, _| enabled.contains(source));
        self.factory.build(descriptor, visible)
    }

    async fn run_activate(&self, target: HookTarget) -> Result<(), ExtensionRuntimeFailure> {
        let HookTarget {
            extension_id,
            extension,
            bundle,
            ..
        } = target;
        contain(&extension_id, ExtensionPhase::Activate, self.hook_timeout, async move {
            extension.on_activate(&bundle).await
        })
        .await
    }

    /// Store `failure` if the slot still holds `generation`
    async fn record_failure(&self, generation: u64, failure: ExtensionRuntimeFailure) {
        let mut guard = self.slot.lock().await;
        match guard.as_mut() {
            Some(slot) if slot.generation == generation => slot.failure = Some(failure),
            _ => debug!(
                extension_id = %failure.extension_id,
                phase = %failure.phase,
                "Dropping failure of an unmounted extension"
            ),
        }
    }

    /// Mount `extension_id` over `snapshot`, unmounting the current extension
    pub async fn activate(&self, extension_id: &str, snapshot: ContentSnapshot) -> SDKResult<()> {
        let registered = self
            .registry
            .get(extension_id)
            .await
            .ok_or_else(|| SDKError::not_found("Extension", extension_id))?;
        if !registered.enabled {
            return Err(SDKError::extension(format!(
                "extension {} is disabled",
                extension_id
            )));
        }

        let mut guard = self.slot.lock().await;
        if guard
            .as_ref()
            .is_some_and(|current| current.descriptor.id == extension_id)
        {
            drop(guard);
            return self.update_snapshot(snapshot).await;
        }

        let previous = guard.take();
        let bundle = self.build_bundle(&registered.descriptor, &snapshot).await;
        let document_id = snapshot.document_id.clone();
        let slot = Slot {
            generation: self.next_generation(),
            descriptor: registered.descriptor,
            extension: registered.extension,
            snapshot,
            bundle,
            failure: None,
        };
        let target = slot.hook_target();
        *guard = Some(slot);
        drop(guard);

        if let Some(previous) = previous {
            self.unmount(previous).await;
        }

        let generation = target.generation;
        let failed = match self.run_activate(target).await {
            Ok(()) => false,
            Err(failure) => {
                self.record_failure(generation, failure).await;
                true
            }
        };

        info!(extension_id, %document_id, failed, "Activated extension");
        self.events.emit(
            HostEvent::ExtensionActivated,
            &json!({ "extensionId": extension_id, "failed": failed }),
        );
        Ok(())
    }

    /// Unmount the current extension, returning its ID
    pub async fn deactivate(&self) -> Option<String> {
        let previous = self.slot.lock().await.take()?;
        let id = previous.descriptor.id.clone();
        self.unmount(previous).await;
        Some(id)
    }

    /// Run `on_deactivate` for a slot already removed from the supervisor
    async fn unmount(&self, slot: Slot) {
        let id = slot.descriptor.id.clone();
        if slot.failure.is_none() {
            let HookTarget {
                extension, bundle, ..
            } = slot.hook_target();
            // A failing deactivate hook cannot block the switch.
            let _ = contain(&id, ExtensionPhase::Deactivate, self.hook_timeout, async move {
                extension.on_deactivate(&bundle).await
            })
            .await;
        }

        let removed = self.events.remove_owner(&id);
        info!(extension_id = %id, subscriptions = removed, "Deactivated extension");
        self.events.emit(
            HostEvent::ExtensionDeactivated,
            &json!({ "extensionId": id }),
        );
    }

    /// Rebuild the bundle over a new snapshot.
    ///
    /// `on_document_change` runs only when the document ID changed.
    pub async fn update_snapshot(&self, snapshot: ContentSnapshot) -> SDKResult<()> {
        let (target, document_id) = {
            let mut guard = self.slot.lock().await;
            let Some(slot) = guard.as_mut() else {
                return Ok(());
            };
            if slot.snapshot == snapshot {
                return Ok(());
            }

            let document_changed = slot.snapshot.document_id != snapshot.document_id;
            slot.bundle = self.build_bundle(&slot.descriptor, &snapshot).await;
            slot.snapshot = snapshot;
            debug!(
                extension_id = %slot.descriptor.id,
                document_changed,
                "Rebuilt capability bundle"
            );

            if !document_changed || slot.failure.is_some() {
                return Ok(());
            }
            let document_id = Some(slot.snapshot.document_id.clone()).filter(|id| !id.is_empty());
            (slot.hook_target(), document_id)
        };

        let HookTarget {
            generation,
            extension_id,
            extension,
            bundle,
        } = target;
        let outcome = contain(
            &extension_id,
            ExtensionPhase::DocumentChange,
            self.hook_timeout,
            async move {
                extension
                    .on_document_change(&bundle, document_id.as_deref())
                    .await
            },
        )
        .await;
        if let Err(failure) = outcome {
            self.record_failure(generation, failure).await;
        }
        Ok(())
    }

    /// Render the slot
    pub async fn render(&self) -> SlotView {
        let target = {
            let guard = self.slot.lock().await;
            let Some(slot) = guard.as_ref() else {
                return SlotView::Empty;
            };
            if let Some(failure) = &slot.failure {
                return SlotView::Failed {
                    failure: failure.clone(),
                    can_retry: true,
                };
            }
            slot.hook_target()
        };

        let HookTarget {
            generation,
            extension_id,
            extension,
            bundle,
        } = target;
        let outcome = contain(&extension_id, ExtensionPhase::Render, self.hook_timeout, async move {
            extension.render(&bundle).await
        })
        .await;

        match outcome {
            Ok(view) => SlotView::Rendered { extension_id, view },
            Err(failure) => {
                self.record_failure(generation, failure.clone()).await;
                SlotView::Failed {
                    failure,
                    can_retry: true,
                }
            }
        }
    }

    /// Clear a failure, remount the extension and render it again
    pub async fn retry(&self) -> SlotView {
        let target = {
            let mut guard = self.slot.lock().await;
            let Some(slot) = guard.as_mut() else {
                return SlotView::Empty;
            };
            if slot.failure.take().is_some() {
                info!(extension_id = %slot.descriptor.id, "Retrying failed extension");
                slot.generation = self.next_generation();
                slot.bundle = self.build_bundle(&slot.descriptor, &slot.snapshot).await;
                Some(slot.hook_target())
            } else {
                None
            }
        };

        if let Some(target) = target {
            let generation = target.generation;
            if let Err(failure) = self.run_activate(target).await {
                self.record_failure(generation, failure).await;
            }
        }
        self.render().await
    }

    /// Current slot state
    pub async fn state(&self) -> SlotState {
        let guard = self.slot.lock().await;
        match guard.as_ref() {
            Some(slot) => SlotState {
                active: Some(slot.descriptor.id.clone()),
                document_id: Some(slot.snapshot.document_id.clone()),
                failure: slot.failure.clone(),
            },
            None => SlotState {
                active: None,
                document_id: None,
                failure: None,
            },
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("hook_timeout", &self.hook_timeout)
            .finish_non_exhaustive()
    }
}
