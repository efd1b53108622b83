//! # Transport Event Translation
//!
//! [`EventHandler`] turns raw [`TransportEvent`]s into app-level
//! [`PlaybackEvent`]s and keeps `PlaybackState` in step with what the
//! engine reports. Progress reports go through [`ProgressTracker`].
//!
//! Progress and status callbacks are applied as soon as they arrive, without
//! waiting for the provider's operation lock. They are passive telemetry and
//! may overtake a queued transport operation.

use core_runtime::events::{EventBus, PlaybackEvent};
use core_runtime::PlaybackStatus;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::state::PlaybackState;
use crate::traits::{NativeState, TransportEvent};

/// Fold an engine state into the five app statuses.
///
/// | Native                                  | App       |
/// |-----------------------------------------|-----------|
/// | `Playing`                               | `playing` |
/// | `Paused`, `Ready`                       | `paused`  |
/// | `Connecting`, `Loading`, `Buffering`    | `loading` |
/// | `Error`                                 | `error`   |
/// | `None`, `Stopped`, `Ended`, `Other(_)`  | `idle`    |
pub fn map_native_state(state: &NativeState) -> PlaybackStatus {
    match state {
        NativeState::Playing => PlaybackStatus::Playing,
        NativeState::Paused | NativeState::Ready => PlaybackStatus::Paused,
        NativeState::Connecting | NativeState::Loading | NativeState::Buffering => {
            PlaybackStatus::Loading
        }
        NativeState::Error => PlaybackStatus::Error,
        NativeState::None | NativeState::Stopped | NativeState::Ended | NativeState::Other(_) => {
            PlaybackStatus::Idle
        }
    }
}

/// What the provider must do after a transport event was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Continue,
    /// The loaded track finished; queue navigation is up to the provider.
    TrackEnded,
}

/// Position and duration bookkeeping.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    events: EventBus,
}

impl ProgressTracker {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }

    /// Record a progress report. `duration-change` is only published when the
    /// reported duration differs from the recorded one; `position-change` is
    /// published every time.
    pub fn on_progress(&self, state: &mut PlaybackState, position: Duration, duration: Duration) {
        if !duration.is_zero() && duration != state.duration {
            let _ = self
                .events
                .emit_playback(PlaybackEvent::duration_changed(as_millis(duration)));
        }

        state.set_progress(position, duration);
        let _ = self.events.emit_playback(PlaybackEvent::position_changed(
            as_millis(state.position),
            as_millis(state.duration),
        ));
    }
}

pub struct EventHandler {
    state: Arc<Mutex<PlaybackState>>,
    events: EventBus,
    progress: ProgressTracker,
}

impl EventHandler {
    pub fn new(state: Arc<Mutex<PlaybackState>>, events: EventBus) -> Self {
        Self {
            progress: ProgressTracker::new(events.clone()),
            state,
            events,
        }
    }

    pub fn handle(&self, event: TransportEvent) -> Reaction {
        match event {
            TransportEvent::StateChanged(native) => {
                let status = map_native_state(&native);
                debug!(native = ?native, status = %status, "Transport state changed");
                self.set_status(status);
            }
            TransportEvent::Progress {
                position,
                duration,
                ..
            } => {
                let mut state = self.state.lock();
                self.progress.on_progress(&mut state, position, duration);
            }
            TransportEvent::QueueEnded => {
                debug!("Transport reached end of track");
                return Reaction::TrackEnded;
            }
            TransportEvent::Error(message) => {
                warn!(error = %message, "Transport reported an error");
                self.set_status(PlaybackStatus::Error);
                let _ = self
                    .events
                    .emit_playback(PlaybackEvent::error(message, true));
            }
            TransportEvent::RemoteNext => {
                let _ = self.events.emit_playback(PlaybackEvent::remote_skip_next());
            }
            TransportEvent::RemotePrevious => {
                let _ = self
                    .events
                    .emit_playback(PlaybackEvent::remote_skip_previous());
            }
        }
        Reaction::Continue
    }

    /// Update the status, publishing `status-change` only on an actual change.
    pub fn set_status(&self, status: PlaybackStatus) {
        let previous = std::mem::replace(&mut self.state.lock().status, status);
        if previous != status {
            let _ = self
                .events
                .emit_playback(PlaybackEvent::status_changed(status));
        }
    }
}

pub(crate) fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
