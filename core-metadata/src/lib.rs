//! # Core Metadata
//!
//! Album and lyrics lookups on top of the plugin registry.
//!
//! Both services pick an active provider plugin for the request, then go
//! through a [`CachedService`]: a TTL cache that also collapses concurrent
//! requests for the same key into one provider call.
//!
//! ## Features
//!
//! - `albums`: [`AlbumService`], keyed by `source:album_id`
//! - `lyrics`: [`LyricsService`], keyed by track

pub mod cache;
pub mod error;

#[cfg(feature = "albums")]
pub mod album;

#[cfg(feature = "lyrics")]
pub mod lyrics;

pub use cache::{CacheEntry, CachedService};
pub use error::{MetadataError, Result};

#[cfg(feature = "albums")]
pub use album::{parse_album_key, AlbumService, ALBUMS_CAPABILITY};

#[cfg(feature = "lyrics")]
pub use lyrics::{LyricsService, LYRICS_CAPABILITY};
