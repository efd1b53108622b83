//! # Event Bus System
//!
//! Event-driven plumbing for the media core using `tokio::sync::broadcast`.
//! Components publish typed events; presentation, now-playing, sleep-timer
//! and history collaborators subscribe independently.
//!
//! ## Overview
//!
//! - **Event Types**: [`PlaybackEvent`] (the closed playback vocabulary) and
//!   [`PluginEvent`] (registry changes), wrapped in [`CoreEvent`]
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ```text
//! ┌──────────────────┐     emit      ┌───────────┐    subscribe   ┌────────────┐
//! │ PlaybackProvider ├──────────────>│           ├───────────────>│ Now playing│
//! └──────────────────┘               │ EventBus  │                └────────────┘
//! ┌──────────────────┐     emit      │           │    subscribe   ┌────────────┐
//! │  PluginRegistry  ├──────────────>│           ├───────────────>│  History   │
//! └──────────────────┘               └───────────┘                └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::ended())).ok();
//!
//! let event = rx.recv().await.unwrap();
//! assert_eq!(event.kind(), "ended");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitting with no subscribers returns `Err`; publishers treat that as
//! "nobody listening" and ignore it.

use chrono::{DateTime, Utc};
use core_async::sync::broadcast;
use core_library::models::Track;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Transport and queue events
    Playback(PlaybackEvent),
    /// Plugin registry changes
    Plugin(PluginEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Plugin(e) => e.description(),
        }
    }

    /// Stable kebab-case name of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreEvent::Playback(e) => e.kind(),
            CoreEvent::Plugin(e) => e.kind(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error {
                recoverable: false, ..
            }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Warning,
            CoreEvent::Plugin(PluginEvent::StatusChanged { to, .. }) if to == "error" => {
                EventSeverity::Warning
            }
            CoreEvent::Playback(PlaybackEvent::TrackChanged { .. })
            | CoreEvent::Playback(PlaybackEvent::Ended { .. })
            | CoreEvent::Plugin(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Application-level playback status.
///
/// Every native transport state maps onto exactly one of these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Error,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Loading => "loading",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Error => "error",
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed vocabulary of playback events. Every variant is timestamped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    #[serde(rename = "status-change")]
    StatusChanged {
        status: PlaybackStatus,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "track-change")]
    TrackChanged {
        /// `None` when playback was cleared.
        track: Option<Track>,
        index: Option<usize>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "duration-change")]
    DurationChanged {
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "position-change")]
    PositionChanged {
        position_ms: u64,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "queue-change")]
    QueueChanged {
        length: usize,
        current_index: Option<usize>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "error")]
    Error {
        message: String,
        recoverable: bool,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "ended")]
    Ended { timestamp: DateTime<Utc> },
    #[serde(rename = "remote-skip-next")]
    RemoteSkipNext { timestamp: DateTime<Utc> },
    #[serde(rename = "remote-skip-previous")]
    RemoteSkipPrevious { timestamp: DateTime<Utc> },
}

impl PlaybackEvent {
    pub fn status_changed(status: PlaybackStatus) -> Self {
        PlaybackEvent::StatusChanged {
            status,
            timestamp: Utc::now(),
        }
    }

    pub fn track_changed(track: Option<Track>, index: Option<usize>) -> Self {
        PlaybackEvent::TrackChanged {
            track,
            index,
            timestamp: Utc::now(),
        }
    }

    pub fn duration_changed(duration_ms: u64) -> Self {
        PlaybackEvent::DurationChanged {
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn position_changed(position_ms: u64, duration_ms: u64) -> Self {
        PlaybackEvent::PositionChanged {
            position_ms,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn queue_changed(length: usize, current_index: Option<usize>) -> Self {
        PlaybackEvent::QueueChanged {
            length,
            current_index,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>, recoverable: bool) -> Self {
        PlaybackEvent::Error {
            message: message.into(),
            recoverable,
            timestamp: Utc::now(),
        }
    }

    pub fn ended() -> Self {
        PlaybackEvent::Ended {
            timestamp: Utc::now(),
        }
    }

    pub fn remote_skip_next() -> Self {
        PlaybackEvent::RemoteSkipNext {
            timestamp: Utc::now(),
        }
    }

    pub fn remote_skip_previous() -> Self {
        PlaybackEvent::RemoteSkipPrevious {
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PlaybackEvent::StatusChanged { .. } => "status-change",
            PlaybackEvent::TrackChanged { .. } => "track-change",
            PlaybackEvent::DurationChanged { .. } => "duration-change",
            PlaybackEvent::PositionChanged { .. } => "position-change",
            PlaybackEvent::QueueChanged { .. } => "queue-change",
            PlaybackEvent::Error { .. } => "error",
            PlaybackEvent::Ended { .. } => "ended",
            PlaybackEvent::RemoteSkipNext { .. } => "remote-skip-next",
            PlaybackEvent::RemoteSkipPrevious { .. } => "remote-skip-previous",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            PlaybackEvent::StatusChanged { timestamp, .. }
            | PlaybackEvent::TrackChanged { timestamp, .. }
            | PlaybackEvent::DurationChanged { timestamp, .. }
            | PlaybackEvent::PositionChanged { timestamp, .. }
            | PlaybackEvent::QueueChanged { timestamp, .. }
            | PlaybackEvent::Error { timestamp, .. }
            | PlaybackEvent::Ended { timestamp }
            | PlaybackEvent::RemoteSkipNext { timestamp }
            | PlaybackEvent::RemoteSkipPrevious { timestamp } => *timestamp,
        }
    }

    fn description(&self) -> &str {
        match self {
            PlaybackEvent::StatusChanged { .. } => "Playback status changed",
            PlaybackEvent::TrackChanged { .. } => "Current track changed",
            PlaybackEvent::DurationChanged { .. } => "Track duration changed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::QueueChanged { .. } => "Queue changed",
            PlaybackEvent::Error { .. } => "Playback error",
            PlaybackEvent::Ended { .. } => "Queue ended",
            PlaybackEvent::RemoteSkipNext { .. } => "Remote skip to next",
            PlaybackEvent::RemoteSkipPrevious { .. } => "Remote skip to previous",
        }
    }
}

// ============================================================================
// Plugin Events
// ============================================================================

/// Registry notifications consumed by plugin management UIs.
///
/// Statuses travel as their lowercase names so this crate does not depend on
/// the plugin runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PluginEvent {
    Registered {
        plugin_id: String,
        category: String,
    },
    StatusChanged {
        plugin_id: String,
        from: String,
        to: String,
    },
    Unregistered {
        plugin_id: String,
    },
}

impl PluginEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PluginEvent::Registered { .. } => "plugin-registered",
            PluginEvent::StatusChanged { .. } => "plugin-status-change",
            PluginEvent::Unregistered { .. } => "plugin-unregistered",
        }
    }

    fn description(&self) -> &str {
        match self {
            PluginEvent::Registered { .. } => "Plugin registered",
            PluginEvent::StatusChanged { .. } => "Plugin status changed",
            PluginEvent::Unregistered { .. } => "Plugin unregistered",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Shorthand for `emit(CoreEvent::Playback(event))`.
    pub fn emit_playback(&self, event: PlaybackEvent) -> Result<usize, SendError<CoreEvent>> {
        self.emit(CoreEvent::Playback(event))
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver with an optional predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only playback events.
    pub fn playback_only(self) -> Self {
        self.filter(|event| matches!(event, CoreEvent::Playback(_)))
    }

    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
