//! # Lyrics Service
//!
//! Looks up lyrics through the active `lyrics-provider` plugins.
//!
//! Providers whose source matches the track's are asked first, then the rest
//! in registration order. The first provider with lyrics wins. A provider
//! answering "none" or failing just moves on to the next one.

use bridge_traits::time::Clock;
use core_library::models::{Lyrics, Track};
use core_plugins::{PluginCategory, PluginHandle, PluginRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::cache::CachedService;
use crate::error::{MetadataError, Result};

/// Capability a lyrics plugin must advertise.
pub const LYRICS_CAPABILITY: &str = "lyrics";

#[derive(Debug, Clone)]
pub struct LyricsService {
    registry: Arc<PluginRegistry>,
    cache: CachedService<String, Lyrics>,
}

impl LyricsService {
    pub fn new(registry: Arc<PluginRegistry>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            registry,
            cache: CachedService::new("lyrics", ttl, clock),
        }
    }

    /// Lyrics for `track`, cached per `source:track_id`.
    ///
    /// "Not found" is not cached; the next call asks the providers again.
    #[instrument(skip(self, track), fields(track_id = %track.id, source = %track.source))]
    pub async fn get_lyrics(&self, track: &Track) -> Result<Lyrics> {
        let candidates = self.providers_for(&track.source);
        if candidates.is_empty() {
            return Err(MetadataError::provider_not_found(
                track.source.clone(),
                LYRICS_CAPABILITY,
            ));
        }

        let track = track.clone();
        self.cache
            .get_or_fetch(Self::cache_key(&track), move || {
                fetch_lyrics(candidates, track)
            })
            .await
    }

    /// Drop the cached lyrics for `track`, e.g. after the user reports them
    /// as wrong.
    pub fn invalidate(&self, track: &Track) -> bool {
        self.cache.invalidate(&Self::cache_key(track))
    }

    pub fn cache(&self) -> &CachedService<String, Lyrics> {
        &self.cache
    }

    fn cache_key(track: &Track) -> String {
        format!("{}:{}", track.source, track.id)
    }

    /// Matching-source providers first, keeping registration order otherwise.
    fn providers_for(&self, source: &str) -> Vec<PluginHandle> {
        let (mut preferred, rest): (Vec<_>, Vec<_>) = self
            .registry
            .active_plugins(PluginCategory::LyricsProvider, Some(LYRICS_CAPABILITY))
            .into_iter()
            .filter(|handle| handle.instance.as_lyrics_provider().is_some())
            .partition(|handle| {
                handle
                    .instance
                    .as_lyrics_provider()
                    .is_some_and(|provider| provider.source() == source)
            });
        preferred.extend(rest);
        preferred
    }
}

async fn fetch_lyrics(candidates: Vec<PluginHandle>, track: Track) -> Result<Lyrics> {
    for handle in &candidates {
        let Some(provider) = handle.instance.as_lyrics_provider() else {
            continue;
        };

        info!(
            plugin_id = %handle.manifest.id,
            provider_source = provider.source(),
            "Attempting to fetch lyrics"
        );

        match provider.get_lyrics(&track).await {
            Ok(Some(lyrics)) => {
                info!(
                    plugin_id = %handle.manifest.id,
                    synced = lyrics.synced,
                    "Lyrics found"
                );
                return Ok(lyrics);
            }
            Ok(None) => {
                debug!(plugin_id = %handle.manifest.id, "Provider has no lyrics for track");
                continue;
            }
            Err(e) => {
                warn!(
                    plugin_id = %handle.manifest.id,
                    error = %e,
                    "Lyrics provider failed, trying next"
                );
                continue;
            }
        }
    }

    debug!(track_id = %track.id, "No provider had lyrics");
    Err(MetadataError::LyricsNotFound(track.id))
}
