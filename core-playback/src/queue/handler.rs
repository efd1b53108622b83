//! Queue mutations plus change notification.

use core_library::models::{RepeatMode, Track};
use core_runtime::events::{EventBus, PlaybackEvent};
use tracing::debug;

use super::manager::{QueueManager, Removal};
use crate::error::Result;
use crate::state::PlaybackState;

/// Wraps [`QueueManager`] and publishes `queue-change` after every
/// structural change.
pub struct QueueHandler {
    manager: QueueManager,
    events: EventBus,
}

impl QueueHandler {
    pub fn new(manager: QueueManager, events: EventBus) -> Self {
        Self { manager, events }
    }

    pub fn manager(&self) -> &QueueManager {
        &self.manager
    }

    pub fn set_queue(
        &self,
        state: &mut PlaybackState,
        tracks: Vec<Track>,
        start_index: usize,
    ) -> Result<Option<usize>> {
        let start = self.manager.set_queue(state, tracks, start_index)?;
        self.notify(state);
        Ok(start)
    }

    pub fn add(&self, state: &mut PlaybackState, tracks: Vec<Track>, at: Option<usize>) -> usize {
        let count = tracks.len();
        let index = self.manager.add(state, tracks, at);
        if count > 0 {
            debug!(index, count, "Tracks added to queue");
            self.notify(state);
        }
        index
    }

    pub fn remove(&self, state: &mut PlaybackState, index: usize) -> Result<Removal> {
        let removal = self.manager.remove(state, index)?;
        debug!(index, "Track removed from queue");
        self.notify(state);
        Ok(removal)
    }

    pub fn clear(&self, state: &mut PlaybackState) {
        self.manager.clear(state);
        self.notify(state);
    }

    pub fn toggle_shuffle(&self, state: &mut PlaybackState) -> bool {
        let shuffled = self.manager.toggle_shuffle(state);
        debug!(shuffled, "Shuffle toggled");
        self.notify(state);
        shuffled
    }

    pub fn set_repeat(&self, state: &mut PlaybackState, mode: RepeatMode) {
        state.repeat_mode = mode;
    }

    pub fn cycle_repeat(&self, state: &mut PlaybackState) -> RepeatMode {
        self.manager.cycle_repeat(state)
    }

    /// Publish the current queue shape.
    pub fn notify(&self, state: &PlaybackState) {
        let _ = self.events.emit_playback(PlaybackEvent::queue_changed(
            state.queue.len(),
            state.current_index,
        ));
    }
}
