//! Core service façade and bootstrap helpers.
//!
//! [`CoreService::bootstrap`] turns a validated [`CoreConfig`] plus the
//! host-provided [`CoreDependencies`] into a running core:
//!
//! 1. Forwards logs to the configured `LoggerSink`, if any
//! 2. Creates the event bus and the plugin registry
//! 3. Registers the built-in playback provider and every extra plugin
//! 4. Initializes and activates them
//! 5. Builds the album and lyrics services the feature flags ask for
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use core_playback::{NativeTransport, StreamResolver};
//! use core_runtime::config::CoreConfig;
//! use core_service::{CoreDependencies, CoreService};
//!
//! # async fn example(
//! #     transport: Arc<dyn NativeTransport>,
//! #     resolver: Arc<dyn StreamResolver>,
//! # ) -> core_service::Result<()> {
//! let config = CoreConfig::builder().persist_volume(false).build()?;
//! let core = CoreService::bootstrap(config, CoreDependencies::new(transport, resolver)).await?;
//!
//! let _events = core.subscribe();
//! core.playback().pause().await?;
//! core.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::fmt;
use std::sync::Arc;

use core_playback::{
    NativeTransport, PlaybackConfig, PlaybackProvider, StreamResolver, PLAYBACK_PROVIDER_ID,
};
use core_plugins::{Plugin, PluginManifest, PluginRegistry, RegistryConfig};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use core_runtime::logging::{init_logging, LoggingConfig};
use tracing::{info, warn};

#[cfg(feature = "albums")]
use core_metadata::AlbumService;
#[cfg(feature = "lyrics")]
use core_metadata::LyricsService;

/// Builds a plugin instance from its manifest.
pub type PluginFactory =
    Box<dyn FnOnce(&PluginManifest) -> core_plugins::Result<Arc<dyn Plugin>> + Send>;

/// A plugin to register during bootstrap.
pub struct PluginRegistration {
    pub manifest: PluginManifest,
    pub factory: PluginFactory,
}

impl PluginRegistration {
    pub fn new<F>(manifest: PluginManifest, factory: F) -> Self
    where
        F: FnOnce(&PluginManifest) -> core_plugins::Result<Arc<dyn Plugin>> + Send + 'static,
    {
        Self {
            manifest,
            factory: Box::new(factory),
        }
    }

    /// Register an already constructed plugin.
    pub fn instance(manifest: PluginManifest, plugin: Arc<dyn Plugin>) -> Self {
        Self::new(manifest, move |_| Ok(plugin))
    }
}

impl fmt::Debug for PluginRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistration")
            .field("id", &self.manifest.id)
            .finish()
    }
}

/// Host-side collaborators the core cannot build itself.
pub struct CoreDependencies {
    pub transport: Arc<dyn NativeTransport>,
    pub resolver: Arc<dyn StreamResolver>,
    pub playback: PlaybackConfig,
    pub plugins: Vec<PluginRegistration>,
}

impl CoreDependencies {
    pub fn new(transport: Arc<dyn NativeTransport>, resolver: Arc<dyn StreamResolver>) -> Self {
        Self {
            transport,
            resolver,
            playback: PlaybackConfig::default(),
            plugins: Vec::new(),
        }
    }

    pub fn with_playback_config(mut self, config: PlaybackConfig) -> Self {
        self.playback = config;
        self
    }

    /// Metadata, lyrics or any other plugin to bring up with the core.
    pub fn with_plugin(mut self, registration: PluginRegistration) -> Self {
        self.plugins.push(registration);
        self
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    events: EventBus,
    registry: Arc<PluginRegistry>,
    playback: Arc<PlaybackProvider>,
    #[cfg(feature = "albums")]
    albums: Option<AlbumService>,
    #[cfg(feature = "lyrics")]
    lyrics: Option<LyricsService>,
}

impl CoreService {
    /// Bring the core up.
    ///
    /// Fails if the playback provider cannot be initialized and activated,
    /// or if an extra plugin cannot be registered. An extra plugin failing
    /// its own lifecycle hooks is logged and left in `error`.
    pub async fn bootstrap(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;
        deps.playback
            .validate()
            .map_err(CoreError::InitializationFailed)?;

        if let Some(sink) = config.logger_sink.clone() {
            if let Err(e) = init_logging(LoggingConfig::default().with_logger_sink(sink)) {
                warn!(error = %e, "Logging already initialized, host sink not attached");
            }
        }

        let events = EventBus::new(config.event_buffer_size);
        let registry = Arc::new(
            PluginRegistry::new(RegistryConfig::default()).with_event_bus(events.clone()),
        );

        let CoreDependencies {
            transport,
            resolver,
            playback: playback_config,
            plugins,
        } = deps;

        let settings = config
            .features
            .persist_volume
            .then(|| config.settings_store.clone())
            .flatten();
        let provider_events = events.clone();
        registry.register(PlaybackProvider::manifest(), move |_| {
            let mut provider =
                PlaybackProvider::new(transport, resolver, provider_events, playback_config);
            if let Some(store) = settings {
                provider = provider.with_settings_store(store);
            }
            Ok(Arc::new(provider) as Arc<dyn Plugin>)
        })?;
        let playback = registry.get_plugin_as::<PlaybackProvider>(PLAYBACK_PROVIDER_ID)?;
        Self::start_plugin(&registry, PLAYBACK_PROVIDER_ID)
            .await
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;

        for registration in plugins {
            let id = registration.manifest.id.clone();
            registry.register(registration.manifest, registration.factory)?;
            if let Err(e) = Self::start_plugin(&registry, &id).await {
                warn!(plugin_id = %id, error = %e, "Plugin failed to start");
            }
        }

        #[cfg(feature = "albums")]
        let albums = config.features.enable_albums.then(|| {
            AlbumService::new(
                Arc::clone(&registry),
                Arc::clone(&config.clock),
                config.cache_ttl.album_ttl,
            )
        });

        #[cfg(feature = "lyrics")]
        let lyrics = config.features.enable_lyrics.then(|| {
            LyricsService::new(
                Arc::clone(&registry),
                Arc::clone(&config.clock),
                config.cache_ttl.lyrics_ttl,
            )
        });

        info!(plugins = registry.len(), "Core service started");

        Ok(Self {
            config: Arc::new(config),
            events,
            registry,
            playback,
            #[cfg(feature = "albums")]
            albums,
            #[cfg(feature = "lyrics")]
            lyrics,
        })
    }

    async fn start_plugin(registry: &PluginRegistry, id: &str) -> core_plugins::Result<()> {
        registry.initialize(id).await?;
        registry.activate(id).await
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn playback(&self) -> &Arc<PlaybackProvider> {
        &self.playback
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Album service, if enabled in [`CoreConfig::features`].
    #[cfg(feature = "albums")]
    pub fn albums(&self) -> Result<&AlbumService> {
        self.albums.as_ref().ok_or(CoreError::FeatureDisabled("albums"))
    }

    /// Lyrics service, if enabled in [`CoreConfig::features`].
    #[cfg(feature = "lyrics")]
    pub fn lyrics(&self) -> Result<&LyricsService> {
        self.lyrics.as_ref().ok_or(CoreError::FeatureDisabled("lyrics"))
    }

    /// Destroy every plugin, newest first. Playback stops.
    pub async fn shutdown(&self) {
        info!("Shutting down core service");
        self.registry.shutdown().await;
    }
}

impl fmt::Debug for CoreService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreService")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}
