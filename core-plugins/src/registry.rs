//! # Plugin Registry
//!
//! Owns every plugin instance, enforces lifecycle transitions and answers
//! capability lookups.
//!
//! ## Lifecycle
//!
//! - `initialize`: `uninitialized`/`error` → `initializing` → `ready` (or `error`).
//!   Already `ready`/`active` plugins are left alone.
//! - `activate`: only from `ready`; anything else is `InvalidState` and nothing
//!   changes. A failing hook moves the plugin to `error`.
//! - `deactivate`: `active` → `ready`; a no-op for every other status.
//! - `destroy`: any → `disabled`, unless the plugin is the last usable one of
//!   a mandatory category.
//!
//! Lifecycle operations on the same plugin id are serialized through a
//! per-plugin [`OperationLock`]; operations on different plugins run
//! independently.
//!
//! ## Listeners
//!
//! Listeners registered with [`PluginRegistry::on`] see every registration,
//! status change and removal. A listener that fails or panics is logged and
//! skipped; the remaining listeners still run and registry state is
//! untouched. When an [`EventBus`] is attached, the same changes are
//! published as [`PluginEvent`]s.
//!
//! ```no_run
//! use core_plugins::{PluginManifest, PluginCategory, PluginRegistry, RegistryConfig};
//! # use core_plugins::Plugin;
//! # use std::sync::Arc;
//! # struct Player;
//! # #[async_trait::async_trait]
//! # impl Plugin for Player {
//! #     async fn on_initialize(&self) -> core_plugins::Result<()> { Ok(()) }
//! # }
//!
//! # #[tokio::main]
//! # async fn main() -> core_plugins::Result<()> {
//! let registry = PluginRegistry::new(RegistryConfig::default());
//! let manifest = PluginManifest::new("native", "Native Player", "1.0.0", PluginCategory::PlaybackProvider);
//!
//! registry.register(manifest, |_| Ok(Arc::new(Player)))?;
//! registry.initialize("native").await?;
//! registry.activate("native").await?;
//! assert!(registry.is_active("native"));
//! # Ok(())
//! # }
//! ```

use core_async::sync::OperationLock;
use core_runtime::events::{CoreEvent, EventBus, PluginEvent};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::RegistryConfig;
use crate::error::{PluginError, Result};
use crate::manifest::{PluginCategory, PluginManifest, PluginStatus};
use crate::plugin::{AsAny, Plugin};

/// Change notification delivered to registry listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Registered {
        plugin_id: String,
        category: PluginCategory,
    },
    StatusChanged {
        plugin_id: String,
        from: PluginStatus,
        to: PluginStatus,
    },
    Unregistered {
        plugin_id: String,
    },
}

impl RegistryEvent {
    pub fn plugin_id(&self) -> &str {
        match self {
            RegistryEvent::Registered { plugin_id, .. }
            | RegistryEvent::StatusChanged { plugin_id, .. }
            | RegistryEvent::Unregistered { plugin_id } => plugin_id,
        }
    }

    fn to_plugin_event(&self) -> PluginEvent {
        match self {
            RegistryEvent::Registered {
                plugin_id,
                category,
            } => PluginEvent::Registered {
                plugin_id: plugin_id.clone(),
                category: category.to_string(),
            },
            RegistryEvent::StatusChanged {
                plugin_id,
                from,
                to,
            } => PluginEvent::StatusChanged {
                plugin_id: plugin_id.clone(),
                from: from.to_string(),
                to: to.to_string(),
            },
            RegistryEvent::Unregistered { plugin_id } => PluginEvent::Unregistered {
                plugin_id: plugin_id.clone(),
            },
        }
    }
}

/// Callback registered with [`PluginRegistry::on`].
pub type RegistryListener = Arc<dyn Fn(&RegistryEvent) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`PluginRegistry::on`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Snapshot of one registered plugin.
#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub manifest: Arc<PluginManifest>,
    pub status: PluginStatus,
    pub last_error: Option<String>,
}

/// A plugin selected for a capability lookup.
#[derive(Clone)]
pub struct PluginHandle {
    pub manifest: Arc<PluginManifest>,
    pub instance: Arc<dyn Plugin>,
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle")
            .field("id", &self.manifest.id)
            .field("category", &self.manifest.category)
            .finish()
    }
}

struct EntryState {
    status: PluginStatus,
    last_error: Option<String>,
    /// Set while a destroy is in flight; the plugin no longer counts as an
    /// alternative for its category.
    disabling: bool,
}

struct PluginEntry {
    seq: u64,
    manifest: Arc<PluginManifest>,
    instance: Arc<dyn Plugin>,
    state: Mutex<EntryState>,
    lock: OperationLock,
}

impl PluginEntry {
    fn status(&self) -> PluginStatus {
        self.state.lock().status
    }

    fn info(&self) -> PluginInfo {
        let state = self.state.lock();
        PluginInfo {
            manifest: Arc::clone(&self.manifest),
            status: state.status,
            last_error: state.last_error.clone(),
        }
    }

    fn handle(&self) -> PluginHandle {
        PluginHandle {
            manifest: Arc::clone(&self.manifest),
            instance: Arc::clone(&self.instance),
        }
    }
}

/// Clears the disabling mark when a destroy finishes or is dropped midway.
struct RemovalReservation<'a>(&'a PluginEntry);

impl Drop for RemovalReservation<'_> {
    fn drop(&mut self) {
        self.0.state.lock().disabling = false;
    }
}

/// Registry of plugin instances keyed by manifest id.
pub struct PluginRegistry {
    config: RegistryConfig,
    entries: RwLock<HashMap<String, Arc<PluginEntry>>>,
    listeners: RwLock<Vec<(ListenerId, RegistryListener)>>,
    next_seq: AtomicU64,
    next_listener: AtomicU64,
    event_bus: Option<EventBus>,
}

impl PluginRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(0),
            next_listener: AtomicU64::new(0),
            event_bus: None,
        }
    }

    /// Mirror registry changes to `bus` as [`CoreEvent::Plugin`].
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a plugin. The factory runs immediately and its instance is
    /// owned by the registry from then on.
    ///
    /// An id may only be registered again once its previous instance is
    /// `disabled`.
    pub fn register<F>(&self, manifest: PluginManifest, factory: F) -> Result<()>
    where
        F: FnOnce(&PluginManifest) -> Result<Arc<dyn Plugin>>,
    {
        manifest.validate()?;
        self.ensure_id_free(&manifest.id)?;

        let instance = factory(&manifest)?;
        let id = manifest.id.clone();
        let category = manifest.category;
        let entry = Arc::new(PluginEntry {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            manifest: Arc::new(manifest),
            instance,
            state: Mutex::new(EntryState {
                status: PluginStatus::Uninitialized,
                last_error: None,
                disabling: false,
            }),
            lock: OperationLock::new("plugin"),
        });

        {
            let mut entries = self.entries.write();
            if let Some(existing) = entries.get(&id) {
                if existing.status() != PluginStatus::Disabled {
                    return Err(PluginError::AlreadyRegistered(id));
                }
            }
            entries.insert(id.clone(), entry);
        }

        info!(plugin_id = %id, category = %category, "Plugin registered");
        self.notify(RegistryEvent::Registered {
            plugin_id: id,
            category,
        });
        Ok(())
    }

    fn ensure_id_free(&self, id: &str) -> Result<()> {
        match self.entries.read().get(id) {
            Some(existing) if existing.status() != PluginStatus::Disabled => {
                Err(PluginError::AlreadyRegistered(id.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Destroy (subject to the mandatory-category rule) and forget a plugin.
    #[instrument(skip(self), fields(plugin_id = %id))]
    pub async fn unregister(&self, id: &str) -> Result<()> {
        let entry = self.entry(id)?;
        let registry = self;
        let target = &entry;
        entry
            .lock
            .with_lock(move || async move { registry.destroy_entry(target, true).await })
            .await?;

        let removed = {
            let mut entries = self.entries.write();
            match entries.get(id) {
                Some(current) if Arc::ptr_eq(current, &entry) => entries.remove(id).is_some(),
                _ => false,
            }
        };

        if removed {
            info!("Plugin unregistered");
            self.notify(RegistryEvent::Unregistered {
                plugin_id: id.to_string(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Run the plugin's initialization hook.
    #[instrument(skip(self), fields(plugin_id = %id))]
    pub async fn initialize(&self, id: &str) -> Result<()> {
        let entry = self.entry(id)?;
        let registry = self;
        let entry = &entry;
        entry
            .lock
            .with_lock(move || async move {
                match entry.status() {
                    PluginStatus::Ready | PluginStatus::Active => {
                        debug!("Plugin already initialized");
                        return Ok(());
                    }
                    status @ (PluginStatus::Disabled | PluginStatus::Initializing) => {
                        return Err(invalid_state(id, status, "initialize"));
                    }
                    PluginStatus::Uninitialized | PluginStatus::Error => {}
                }

                registry.transition(entry, PluginStatus::Initializing);
                match entry.instance.on_initialize().await {
                    Ok(()) => {
                        entry.state.lock().last_error = None;
                        registry.transition(entry, PluginStatus::Ready);
                        info!("Plugin initialized");
                        Ok(())
                    }
                    Err(err) => {
                        let reason = err.to_string();
                        warn!(error = %reason, "Plugin initialization failed");
                        registry.fail(entry, &reason);
                        Err(PluginError::InitializationFailed {
                            id: id.to_string(),
                            reason,
                        })
                    }
                }
            })
            .await
    }

    /// Move a `ready` plugin to `active`.
    #[instrument(skip(self), fields(plugin_id = %id))]
    pub async fn activate(&self, id: &str) -> Result<()> {
        let entry = self.entry(id)?;
        let registry = self;
        let entry = &entry;
        entry
            .lock
            .with_lock(move || async move {
                let status = entry.status();
                if status != PluginStatus::Ready {
                    return Err(invalid_state(id, status, "activate"));
                }

                match entry.instance.on_activate().await {
                    Ok(()) => {
                        registry.transition(entry, PluginStatus::Active);
                        info!("Plugin activated");
                        Ok(())
                    }
                    Err(err) => {
                        let reason = err.to_string();
                        warn!(error = %reason, "Plugin activation failed");
                        registry.fail(entry, &reason);
                        Err(PluginError::ActivationFailed {
                            id: id.to_string(),
                            reason,
                        })
                    }
                }
            })
            .await
    }

    /// Move an `active` plugin back to `ready`. No-op for any other status.
    #[instrument(skip(self), fields(plugin_id = %id))]
    pub async fn deactivate(&self, id: &str) -> Result<()> {
        let entry = self.entry(id)?;
        let registry = self;
        let entry = &entry;
        entry
            .lock
            .with_lock(move || async move {
                if entry.status() != PluginStatus::Active {
                    debug!("Plugin not active; nothing to deactivate");
                    return Ok(());
                }

                if let Err(err) = entry.instance.on_deactivate().await {
                    warn!(error = %err, "Plugin deactivation hook failed");
                }
                registry.transition(entry, PluginStatus::Ready);
                info!("Plugin deactivated");
                Ok(())
            })
            .await
    }

    /// Move a plugin to `disabled`.
    ///
    /// Fails with [`PluginError::RequiredPlugin`] if the plugin is the last
    /// usable member of a mandatory category.
    #[instrument(skip(self), fields(plugin_id = %id))]
    pub async fn destroy(&self, id: &str) -> Result<()> {
        let entry = self.entry(id)?;
        let registry = self;
        let target = &entry;
        entry
            .lock
            .with_lock(move || async move { registry.destroy_entry(target, true).await })
            .await
    }

    /// Destroy every plugin, newest first. Process teardown only: the
    /// mandatory-category rule does not apply.
    pub async fn shutdown(&self) {
        let mut entries: Vec<Arc<PluginEntry>> = self.entries.read().values().cloned().collect();
        entries.sort_by_key(|e| std::cmp::Reverse(e.seq));

        for entry in &entries {
            let registry = self;
            entry
                .lock
                .with_lock(move || async move {
                    if let Err(err) = registry.destroy_entry(entry, false).await {
                        warn!(plugin_id = %entry.manifest.id, error = %err, "Plugin teardown failed");
                    }
                })
                .await;
        }
        info!(count = entries.len(), "Plugin registry shut down");
    }

    async fn destroy_entry(&self, entry: &PluginEntry, enforce_mandatory: bool) -> Result<()> {
        let Some(status) = self.reserve_removal(entry, enforce_mandatory)? else {
            return Ok(());
        };
        let _reservation = RemovalReservation(entry);

        if status == PluginStatus::Active {
            if let Err(err) = entry.instance.on_deactivate().await {
                warn!(plugin_id = %entry.manifest.id, error = %err, "Plugin deactivation hook failed");
            }
        }
        if let Err(err) = entry.instance.on_destroy().await {
            warn!(plugin_id = %entry.manifest.id, error = %err, "Plugin destroy hook failed");
        }

        self.transition(entry, PluginStatus::Disabled);
        info!(plugin_id = %entry.manifest.id, "Plugin disabled");
        Ok(())
    }

    /// Check the mandatory-category rule and mark `entry` as disabling in one
    /// step under the entries write lock, so two concurrent destroys in the
    /// same category cannot each count the other as the surviving provider.
    ///
    /// Returns the status to tear down from, or `None` if already disabled
    /// or already being disabled.
    fn reserve_removal(
        &self,
        entry: &PluginEntry,
        enforce_mandatory: bool,
    ) -> Result<Option<PluginStatus>> {
        let entries = self.entries.write();

        let status = {
            let state = entry.state.lock();
            if state.status == PluginStatus::Disabled || state.disabling {
                return Ok(None);
            }
            state.status
        };

        let category = entry.manifest.category;
        if enforce_mandatory && self.config.is_mandatory(category) {
            let has_alternative = entries.values().any(|other| {
                other.manifest.id != entry.manifest.id
                    && other.manifest.category == category
                    && {
                        let state = other.state.lock();
                        !state.disabling && state.status.is_available()
                    }
            });
            if !has_alternative {
                warn!(
                    plugin_id = %entry.manifest.id,
                    category = %category,
                    "Refusing to remove last plugin of mandatory category"
                );
                return Err(PluginError::RequiredPlugin {
                    id: entry.manifest.id.clone(),
                    category,
                });
            }
        }

        entry.state.lock().disabling = true;
        Ok(Some(status))
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn get_plugin(&self, id: &str) -> Result<Arc<dyn Plugin>> {
        Ok(Arc::clone(&self.entry(id)?.instance))
    }

    /// Typed access to the concrete plugin object.
    pub fn get_plugin_as<T: Plugin>(&self, id: &str) -> Result<Arc<T>> {
        let instance = self.get_plugin(id)?;
        <dyn Plugin as AsAny>::into_any(instance)
            .downcast::<T>()
            .map_err(|_| PluginError::TypeMismatch {
                id: id.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn get_manifest(&self, id: &str) -> Result<Arc<PluginManifest>> {
        Ok(Arc::clone(&self.entry(id)?.manifest))
    }

    /// All plugins in registration order.
    pub fn get_all_plugins(&self) -> Vec<PluginInfo> {
        self.sorted_entries(|_| true)
            .iter()
            .map(|e| e.info())
            .collect()
    }

    pub fn plugins_by_category(&self, category: PluginCategory) -> Vec<PluginInfo> {
        self.sorted_entries(|e| e.manifest.category == category)
            .iter()
            .map(|e| e.info())
            .collect()
    }

    /// Active plugins of `category`, optionally narrowed to those declaring
    /// `capability`, in registration order.
    pub fn active_plugins(
        &self,
        category: PluginCategory,
        capability: Option<&str>,
    ) -> Vec<PluginHandle> {
        self.sorted_entries(|e| {
            e.manifest.category == category
                && capability.map_or(true, |c| e.manifest.has_capability(c))
                && e.status() == PluginStatus::Active
        })
        .iter()
        .map(|e| e.handle())
        .collect()
    }

    pub fn get_status(&self, id: &str) -> Result<PluginStatus> {
        Ok(self.entry(id)?.status())
    }

    pub fn is_active(&self, id: &str) -> bool {
        matches!(self.get_status(id), Ok(PluginStatus::Active))
    }

    /// Reason of the most recent failed `initialize`/`activate`.
    pub fn last_error(&self, id: &str) -> Option<String> {
        self.entry(id).ok()?.state.lock().last_error.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&RegistryEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` if the listener was already removed.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn entry(&self, id: &str) -> Result<Arc<PluginEntry>> {
        self.entries
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| PluginError::NotFound(id.to_string()))
    }

    fn sorted_entries<P>(&self, predicate: P) -> Vec<Arc<PluginEntry>>
    where
        P: Fn(&PluginEntry) -> bool,
    {
        let mut selected: Vec<Arc<PluginEntry>> = self
            .entries
            .read()
            .values()
            .filter(|e| predicate(e))
            .cloned()
            .collect();
        selected.sort_by_key(|e| e.seq);
        selected
    }

    fn transition(&self, entry: &PluginEntry, to: PluginStatus) {
        let from = std::mem::replace(&mut entry.state.lock().status, to);
        if from != to {
            debug!(plugin_id = %entry.manifest.id, from = %from, to = %to, "Plugin status changed");
            self.notify(RegistryEvent::StatusChanged {
                plugin_id: entry.manifest.id.clone(),
                from,
                to,
            });
        }
    }

    fn fail(&self, entry: &PluginEntry, reason: &str) {
        entry.state.lock().last_error = Some(reason.to_string());
        self.transition(entry, PluginStatus::Error);
    }

    fn notify(&self, event: RegistryEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Plugin(event.to_plugin_event()));
        }

        let listeners: Vec<(ListenerId, RegistryListener)> = self
            .listeners
            .read()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        for (listener_id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(listener = listener_id.0, plugin_id = %event.plugin_id(), error = %err, "Registry listener failed");
                }
                Err(_) => {
                    warn!(listener = listener_id.0, plugin_id = %event.plugin_id(), "Registry listener panicked");
                }
            }
        }
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.len())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

fn invalid_state(id: &str, status: PluginStatus, operation: &'static str) -> PluginError {
    PluginError::InvalidState {
        id: id.to_string(),
        status,
        operation,
    }
}
