//! # Core Playback
//!
//! Queue-aware playback orchestration on top of a host audio engine.
//!
//! ## Overview
//!
//! - [`PlaybackProvider`]: the `playback-provider` plugin and its control surface
//! - [`PlaybackState`]: transport and queue state owned by one provider
//! - [`QueueManager`] / [`QueueHandler`]: queue arithmetic and change events
//! - [`EventHandler`] / [`ProgressTracker`]: native callback translation
//! - [`NativeTransport`] / [`StreamResolver`]: what the host has to provide

pub mod config;
pub mod error;
pub mod events;
pub mod provider;
pub mod queue;
pub mod state;
pub mod traits;

pub use config::PlaybackConfig;
pub use error::{PlaybackError, Result};
pub use events::{map_native_state, EventHandler, ProgressTracker, Reaction};
pub use provider::{PlaybackProvider, PLAYBACK_CAPABILITIES, PLAYBACK_PROVIDER_ID};
pub use queue::{PreviousAction, QueueHandler, QueueManager, Removal, TrackEndAction};
pub use state::PlaybackState;
pub use traits::{
    NativeState, NativeTransport, StreamResolver, TransportError, TransportEvent, TransportSource,
};
