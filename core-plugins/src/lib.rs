//! # Core Plugins
//!
//! Plugin manifests, the lifecycle registry and the capability contracts
//! that the playback, album and lyrics services dispatch through.
//!
//! Plugins are registered with a [`PluginManifest`] plus a factory. The
//! [`PluginRegistry`] owns the resulting instance, drives its lifecycle hooks
//! and answers "which active plugin can do X" lookups via
//! [`PluginRegistry::active_plugins`].

pub mod config;
pub mod error;
pub mod manifest;
pub mod plugin;
pub mod registry;

pub use config::RegistryConfig;
pub use error::{PluginError, Result};
pub use manifest::{PluginCategory, PluginManifest, PluginStatus};
pub use plugin::{AsAny, LyricsProvider, MetadataProvider, Plugin};
pub use registry::{
    ListenerId, PluginHandle, PluginInfo, PluginRegistry, RegistryEvent, RegistryListener,
};
