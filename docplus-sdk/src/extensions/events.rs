//! Extension Event Bus
//!
//! Fan-out of host events to extension callbacks. Emission is synchronous,
//! in registration order, over a snapshot of the subscriber list, so callbacks
//! may subscribe or unsubscribe while an event is being delivered. A failing
//! or panicking callback is logged and does not affect the others.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{trace, warn};

/// Closed vocabulary of events the host emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HostEvent {
    #[serde(rename = "document:saved")]
    DocumentSaved,
    #[serde(rename = "document:changed")]
    DocumentChanged,
    #[serde(rename = "document:switched")]
    DocumentSwitched,
    #[serde(rename = "theme:changed")]
    ThemeChanged,
    #[serde(rename = "locale:changed")]
    LocaleChanged,
    #[serde(rename = "ai:generation-started")]
    AiGenerationStarted,
    #[serde(rename = "ai:generation-completed")]
    AiGenerationCompleted,
    #[serde(rename = "extension:activated")]
    ExtensionActivated,
    #[serde(rename = "extension:deactivated")]
    ExtensionDeactivated,
}

impl HostEvent {
    pub const ALL: [HostEvent; 9] = [
        Self::DocumentSaved,
        Self::DocumentChanged,
        Self::DocumentSwitched,
        Self::ThemeChanged,
        Self::LocaleChanged,
        Self::AiGenerationStarted,
        Self::AiGenerationCompleted,
        Self::ExtensionActivated,
        Self::ExtensionDeactivated,
    ];

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::DocumentSaved => "document:saved",
            Self::DocumentChanged => "document:changed",
            Self::DocumentSwitched => "document:switched",
            Self::ThemeChanged => "theme:changed",
            Self::LocaleChanged => "locale:changed",
            Self::AiGenerationStarted => "ai:generation-started",
            Self::AiGenerationCompleted => "ai:generation-completed",
            Self::ExtensionActivated => "extension:activated",
            Self::ExtensionDeactivated => "extension:deactivated",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.name() == name)
    }
}

impl std::fmt::Display for HostEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Event callback. Registering the same `Arc` twice yields one entry.
pub type EventCallback = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// Wrap a closure as an [`EventCallback`]
pub fn callback<F>(f: F) -> EventCallback
where
    F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

struct Registration {
    id: u64,
    callback: EventCallback,
    owner: Option<String>,
}

/// Host event bus shared by all extensions
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<HostEvent, Vec<Registration>>>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe `callback` to `event`
    pub fn on(self: &Arc<Self>, event: HostEvent, callback: EventCallback) -> Subscription {
        self.register(event, callback, None)
    }

    /// Subscribe on behalf of an extension; see [`EventBus::remove_owner`]
    pub fn on_owned(
        self: &Arc<Self>,
        event: HostEvent,
        callback: EventCallback,
        owner: &str,
    ) -> Subscription {
        self.register(event, callback, Some(owner.to_string()))
    }

    fn register(
        self: &Arc<Self>,
        event: HostEvent,
        callback: EventCallback,
        owner: Option<String>,
    ) -> Subscription {
        let mut subscribers = self.lock();
        let entries = subscribers.entry(event).or_default();

        let id = match entries
            .iter()
            .find(|entry| Arc::ptr_eq(&entry.callback, &callback))
        {
            Some(existing) => existing.id,
            None => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                entries.push(Registration {
                    id,
                    callback,
                    owner,
                });
                id
            }
        };

        Subscription {
            bus: Arc::downgrade(self),
            event,
            id,
        }
    }

    /// Remove `callback` from `event`, returning whether it was registered
    pub fn off(&self, event: HostEvent, callback: &EventCallback) -> bool {
        let mut subscribers = self.lock();
        let Some(entries) = subscribers.get_mut(&event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| !Arc::ptr_eq(&entry.callback, callback));
        before != entries.len()
    }

    fn remove_id(&self, event: HostEvent, id: u64) -> bool {
        let mut subscribers = self.lock();
        let Some(entries) = subscribers.get_mut(&event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        before != entries.len()
    }

    /// Drop every registration made on behalf of `owner`
    pub fn remove_owner(&self, owner: &str) -> usize {
        let mut subscribers = self.lock();
        let mut removed = 0;
        for entries in subscribers.values_mut() {
            let before = entries.len();
            entries.retain(|entry| entry.owner.as_deref() != Some(owner));
            removed += before - entries.len();
        }
        removed
    }

    /// Deliver `payload` to every subscriber of `event`.
    ///
    /// Returns the number of callbacks that completed without error.
    pub fn emit(&self, event: HostEvent, payload: &Value) -> usize {
        let snapshot: Vec<(EventCallback, Option<String>)> = {
            let subscribers = self.lock();
            subscribers
                .get(&event)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|entry| (entry.callback.clone(), entry.owner.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut delivered = 0;
        for (callback, owner) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    warn!(event = %event, owner = ?owner, "Event subscriber failed: {:#}", err);
                }
                Err(panic) => {
                    warn!(
                        event = %event,
                        owner = ?owner,
                        "Event subscriber panicked: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }
        }
        trace!(event = %event, delivered, "Emitted host event");
        delivered
    }

    pub fn subscriber_count(&self, event: HostEvent) -> usize {
        self.lock().get(&event).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<HostEvent, Vec<Registration>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<HostEvent, usize> = self
            .lock()
            .iter()
            .map(|(event, entries)| (*event, entries.len()))
            .collect();
        f.debug_struct("EventBus").field("subscribers", &counts).finish()
    }
}

/// Handle returned by [`EventBus::on`]
#[derive(Debug, Clone)]
pub struct Subscription {
    bus: Weak<EventBus>,
    event: HostEvent,
    id: u64,
}

impl Subscription {
    pub fn event(&self) -> HostEvent {
        self.event
    }

    /// Remove the registration, returning whether it was still present
    pub fn unsubscribe(&self) -> bool {
        self.bus
            .upgrade()
            .is_some_and(|bus| bus.remove_id(self.event, self.id))
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
