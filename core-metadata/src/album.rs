//! Album lookups keyed by `source:album_id`.

use bridge_traits::time::Clock;
use core_library::models::Album;
use core_plugins::{PluginCategory, PluginHandle, PluginRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::cache::CachedService;
use crate::error::{MetadataError, Result};

/// Capability a metadata plugin must advertise to serve albums.
pub const ALBUMS_CAPABILITY: &str = "albums";

/// Split `spotify:4aawyAB9vmqN3uQ7FjRGTy` into source and album id.
///
/// Only the first `:` separates; the id may contain more of them.
pub fn parse_album_key(key: &str) -> Result<(&str, &str)> {
    match key.split_once(':') {
        Some((source, id)) if !source.is_empty() && !id.is_empty() => Ok((source, id)),
        _ => Err(MetadataError::InvalidKey(key.to_string())),
    }
}

/// Album service with per-key caching.
#[derive(Debug, Clone)]
pub struct AlbumService {
    registry: Arc<PluginRegistry>,
    cache: CachedService<String, Album>,
}

impl AlbumService {
    pub fn new(registry: Arc<PluginRegistry>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            registry,
            cache: CachedService::new("albums", ttl, clock),
        }
    }

    /// Album for `key` with tracks in album order.
    ///
    /// Fails with [`MetadataError::ProviderNotFound`] when no active provider
    /// serves the key's source, even if the album is cached.
    #[instrument(skip(self))]
    pub async fn get_album(&self, key: &str) -> Result<Album> {
        let (source, album_id) = parse_album_key(key)?;

        let candidates = self.providers_for(source);
        if candidates.is_empty() {
            debug!(source, "No album provider for source");
            return Err(MetadataError::provider_not_found(source, ALBUMS_CAPABILITY));
        }

        let album_id = album_id.to_string();
        self.cache
            .get_or_fetch(key.to_string(), move || fetch_album(candidates, album_id))
            .await
    }

    pub fn cache(&self) -> &CachedService<String, Album> {
        &self.cache
    }

    fn providers_for(&self, source: &str) -> Vec<PluginHandle> {
        self.registry
            .active_plugins(PluginCategory::MetadataProvider, Some(ALBUMS_CAPABILITY))
            .into_iter()
            .filter(|handle| {
                handle
                    .instance
                    .as_metadata_provider()
                    .is_some_and(|provider| provider.source() == source)
            })
            .collect()
    }
}

/// Try each provider in turn until one answers.
async fn fetch_album(candidates: Vec<PluginHandle>, album_id: String) -> Result<Album> {
    let mut last_error = None;

    for handle in &candidates {
        let Some(provider) = handle.instance.as_metadata_provider() else {
            continue;
        };

        info!(plugin_id = %handle.manifest.id, album_id = %album_id, "Fetching album");
        match provider.get_album(&album_id).await {
            Ok(mut album) => {
                album.sort_tracks();
                debug!(
                    plugin_id = %handle.manifest.id,
                    tracks = album.tracks.len(),
                    "Album fetched"
                );
                return Ok(album);
            }
            Err(e) => {
                warn!(plugin_id = %handle.manifest.id, error = %e, "Album provider failed");
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(e) => MetadataError::FetchFailed(e.to_string()),
        None => MetadataError::FetchFailed(format!("no provider answered for album {album_id}")),
    })
}
