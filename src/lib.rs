//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service`, `core-plugins`, `core-playback`,
//! `core-metadata`). Host applications can depend on `media-core-workspace`
//! and enable the documented features without needing to wire each crate
//! individually.

#[cfg(feature = "service")]
pub use core_service as service;

#[cfg(feature = "plugins")]
pub use core_plugins as plugins;

#[cfg(feature = "playback")]
pub use core_playback as playback;

#[cfg(any(feature = "albums", feature = "lyrics"))]
pub use core_metadata as metadata;
