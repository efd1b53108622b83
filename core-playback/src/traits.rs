//! # Host Playback Contracts
//!
//! The provider never decodes audio itself. It drives a host audio engine
//! through [`NativeTransport`] and asks a [`StreamResolver`] for the URL of
//! each queued track.
//!
//! ## Threading Model
//!
//! Both traits are `Send + Sync`; the provider calls them from whichever task
//! holds its operation lock. Transport callbacks arrive on a broadcast
//! channel obtained from [`NativeTransport::subscribe`].

use async_trait::async_trait;
use core_async::sync::broadcast;
use core_library::models::Track;
use core_runtime::logging::{redact_if_sensitive, redact_stream_url};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::error::Result;

// ============================================================================
// Transport Types
// ============================================================================

/// State reported by the host audio engine.
///
/// Engines report far more states than the app cares about; see
/// [`map_native_state`](crate::events::map_native_state) for how each one is
/// folded into [`PlaybackStatus`](core_runtime::PlaybackStatus).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeState {
    None,
    Ready,
    Stopped,
    Connecting,
    Loading,
    Buffering,
    Playing,
    Paused,
    Ended,
    Error,
    /// Engine-specific state with no app-level meaning.
    Other(String),
}

/// Callback raised by the host audio engine.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    StateChanged(NativeState),
    Progress {
        position: Duration,
        duration: Duration,
        buffered: Duration,
    },
    /// The loaded track finished.
    QueueEnded,
    Error(String),
    /// Lock screen / headset "next" button.
    RemoteNext,
    /// Lock screen / headset "previous" button.
    RemotePrevious,
}

/// A playable stream: resolved URL plus request headers.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct TransportSource {
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl TransportSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

// Stream URLs carry signed tokens and headers carry credentials.
impl fmt::Debug for TransportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: BTreeMap<&str, String> = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), redact_if_sensitive(name, value)))
            .collect();
        f.debug_struct("TransportSource")
            .field("url", &redact_stream_url(&self.url))
            .field("headers", &headers)
            .finish()
    }
}

/// Failure reported by the host audio engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

// ============================================================================
// Host Traits
// ============================================================================

/// Host audio engine.
///
/// The engine holds at most one loaded source. Queue management lives in the
/// provider, which loads tracks one at a time.
#[async_trait]
pub trait NativeTransport: Send + Sync {
    /// Stop playback and unload the current source.
    async fn reset(&self) -> std::result::Result<(), TransportError>;

    async fn load(&self, source: &TransportSource) -> std::result::Result<(), TransportError>;

    async fn play(&self) -> std::result::Result<(), TransportError>;

    async fn pause(&self) -> std::result::Result<(), TransportError>;

    async fn seek(&self, position: Duration) -> std::result::Result<(), TransportError>;

    /// `volume` is already clamped to `[0, 1]`.
    async fn set_volume(&self, volume: f32) -> std::result::Result<(), TransportError>;

    async fn set_rate(&self, rate: f32) -> std::result::Result<(), TransportError>;

    /// Callback stream. Every call returns a new receiver.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;
}

/// Resolves a queued track into something the transport can load.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, track: &Track) -> Result<TransportSource>;
}
