//! # Core Configuration Module
//!
//! The configuration system uses a builder to construct a [`CoreConfig`] that
//! holds the host bridges and settings the core needs. Validation is
//! fail-fast: `build()` refuses inconsistent combinations with an actionable
//! message instead of letting a component fail later.
//!
//! ## Bridges
//!
//! - `Clock` - Time source for cache TTLs (defaults to [`SystemClock`])
//! - `SettingsStore` - Persisted preferences; required when volume persistence is on
//! - `LoggerSink` - Optional host log forwarding
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::CoreConfig;
//! use bridge_traits::MemorySettingsStore;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .settings_store(Arc::new(MemorySettingsStore::new()))
//!     .enable_albums(true)
//!     .enable_lyrics(true)
//!     .build()
//!     .unwrap();
//! assert!(config.features.persist_volume);
//! ```
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Volume persistence is on by default and needs a settings store.
//! CoreConfig::builder().build().expect("Should fail - missing SettingsStore");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, LoggerSink, SettingsStore, SystemClock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const MAX_EVENT_BUFFER_SIZE: usize = 10_000;

/// Core configuration.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// User preferences storage
    pub settings_store: Option<Arc<dyn SettingsStore>>,

    /// Time source for cache bookkeeping
    pub clock: Arc<dyn Clock>,

    /// Host log forwarding
    pub logger_sink: Option<Arc<dyn LoggerSink>>,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,

    /// Feature flags
    pub features: FeatureFlags,

    /// Cache lifetimes for the metadata services
    pub cache_ttl: CacheTtlConfig,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field(
                "settings_store",
                &self.settings_store.as_ref().map(|_| "SettingsStore { ... }"),
            )
            .field("clock", &"Clock { ... }")
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Expose the lyrics service
    #[serde(default)]
    pub enable_lyrics: bool,

    /// Expose the album service
    #[serde(default)]
    pub enable_albums: bool,

    /// Load and store playback volume through the `SettingsStore`
    #[serde(default = "default_true")]
    pub persist_volume: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_lyrics: false,
            enable_albums: false,
            persist_volume: true,
        }
    }
}

/// Time-to-live of metadata cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTtlConfig {
    #[serde(default = "default_album_ttl")]
    pub album_ttl: Duration,
    #[serde(default = "default_lyrics_ttl")]
    pub lyrics_ttl: Duration,
}

fn default_album_ttl() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_lyrics_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            album_ttl: default_album_ttl(),
            lyrics_ttl: default_lyrics_ttl(),
        }
    }
}

impl CacheTtlConfig {
    pub fn validate(&self) -> Result<()> {
        if self.album_ttl.is_zero() {
            return Err(Error::Config("album_ttl must be greater than 0".to_string()));
        }
        if self.lyrics_ttl.is_zero() {
            return Err(Error::Config("lyrics_ttl must be greater than 0".to_string()));
        }
        Ok(())
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - Event buffer size is within (0, 10 000]
    /// - Cache TTLs are non-zero
    /// - Feature flags are consistent with available bridges
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size {} exceeds maximum of {}",
                self.event_buffer_size, MAX_EVENT_BUFFER_SIZE
            )));
        }

        self.cache_ttl.validate()?;

        if self.features.persist_volume && self.settings_store.is_none() {
            return Err(Error::capability_missing(
                "SettingsStore",
                "Volume persistence enabled but no SettingsStore provided. \
                 Inject a SettingsStore or disable persist_volume.",
            ));
        }

        Ok(())
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    settings_store: Option<Arc<dyn SettingsStore>>,
    clock: Option<Arc<dyn Clock>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
    cache_ttl: CacheTtlConfig,
}

impl CoreConfigBuilder {
    /// Sets the settings store implementation.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the time source. Default: [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets a host log sink.
    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Sets the event bus capacity.
    ///
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Enables or disables the lyrics service.
    ///
    /// Default: false
    pub fn enable_lyrics(mut self, enabled: bool) -> Self {
        self.features.enable_lyrics = enabled;
        self
    }

    /// Enables or disables the album service.
    ///
    /// Default: false
    pub fn enable_albums(mut self, enabled: bool) -> Self {
        self.features.enable_albums = enabled;
        self
    }

    /// Enables or disables volume persistence.
    ///
    /// Requires a `SettingsStore`.
    ///
    /// Default: true
    pub fn persist_volume(mut self, enabled: bool) -> Self {
        self.features.persist_volume = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    pub fn album_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl.album_ttl = ttl;
        self
    }

    pub fn lyrics_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl.lyrics_ttl = ttl;
        self
    }

    /// Builds and validates the final `CoreConfig`.
    pub fn build(self) -> Result<CoreConfig> {
        let config = CoreConfig {
            settings_store: self.settings_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            logger_sink: self.logger_sink,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features,
            cache_ttl: self.cache_ttl,
        };

        config.validate()?;

        Ok(config)
    }
}
