//! Plugin lifecycle trait and capability contracts.
//!
//! A plugin is any object implementing [`Plugin`]. Categories that other
//! components call into expose their operations through a capability trait
//! ([`MetadataProvider`], [`LyricsProvider`]); the plugin advertises it via the
//! matching `as_*` accessor so callers dispatch on trait objects instead of
//! concrete types.

use async_trait::async_trait;
use core_library::models::{Album, Lyrics, Track};
use std::any::Any;
use std::sync::Arc;

use crate::error::Result;

/// Upcast to `Any` for typed lookups through the registry.
///
/// Implemented for every `'static + Send + Sync` type; plugins never
/// implement it by hand.
pub trait AsAny: Any + Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Lifecycle hooks driven by the [`PluginRegistry`](crate::PluginRegistry).
///
/// Hooks are never invoked concurrently for the same plugin.
#[async_trait]
pub trait Plugin: AsAny {
    /// Acquire resources. Called on `uninitialized` or `error` plugins.
    async fn on_initialize(&self) -> Result<()>;

    /// Start serving requests.
    async fn on_activate(&self) -> Result<()> {
        Ok(())
    }

    /// Stop serving requests. Failures are logged; the plugin still returns
    /// to `ready`.
    async fn on_deactivate(&self) -> Result<()> {
        Ok(())
    }

    /// Release everything. Failures are logged; the plugin still ends
    /// `disabled`.
    async fn on_destroy(&self) -> Result<()> {
        Ok(())
    }

    fn as_metadata_provider(&self) -> Option<&dyn MetadataProvider> {
        None
    }

    fn as_lyrics_provider(&self) -> Option<&dyn LyricsProvider> {
        None
    }
}

/// Album and track metadata lookups, category `metadata-provider`.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Source key this provider answers for, e.g. `spotify`.
    fn source(&self) -> &str;

    /// Album with its track listing. `album_id` is the provider-local id.
    async fn get_album(&self, album_id: &str) -> Result<Album>;
}

/// Lyrics lookups, category `lyrics-provider`.
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    fn source(&self) -> &str;

    /// `Ok(None)` means the provider has no lyrics for this track.
    async fn get_lyrics(&self, track: &Track) -> Result<Option<Lyrics>>;
}
