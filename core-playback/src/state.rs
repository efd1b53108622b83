//! # Playback State
//!
//! Plain value holder for everything the provider knows about the transport
//! and the queue. One [`PlaybackState`] belongs to one provider, which only
//! mutates it through its own operations.
//!
//! Invariants kept by every mutator in this crate:
//!
//! - `current_index` is `None` or a valid index into `queue`
//! - `current_track.is_some() == current_index.is_some()`
//! - `position <= duration` once the duration is known
//! - `track_index_map` maps every queued track id to its first index

use core_library::models::{QueueItem, RepeatMode, Track};
use core_runtime::PlaybackStatus;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub current_track: Option<Track>,
    pub current_index: Option<usize>,
    pub queue: Vec<Track>,
    pub track_index_map: HashMap<String, usize>,
    pub position: Duration,
    pub duration: Duration,
    pub volume: f32,
    pub rate: f32,
    pub repeat_mode: RepeatMode,
    pub is_shuffled: bool,
    /// Queue order captured when shuffle was switched on.
    pub(crate) unshuffled: Option<Vec<Track>>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PlaybackState {
    pub fn new(volume: f32) -> Self {
        Self {
            status: PlaybackStatus::Idle,
            current_track: None,
            current_index: None,
            queue: Vec::new(),
            track_index_map: HashMap::new(),
            position: Duration::ZERO,
            duration: Duration::ZERO,
            volume,
            rate: 1.0,
            repeat_mode: RepeatMode::Off,
            is_shuffled: false,
            unshuffled: None,
        }
    }

    /// Queue view with the active entry flagged.
    pub fn queue_items(&self) -> Vec<QueueItem> {
        QueueItem::from_queue(&self.queue, self.current_index)
    }

    /// First queue index holding `track_id`.
    pub fn index_of(&self, track_id: &str) -> Option<usize> {
        self.track_index_map.get(track_id).copied()
    }

    /// Point the queue cursor at `index` (or nowhere) and reset progress.
    pub(crate) fn select(&mut self, index: Option<usize>) {
        let index = index.filter(|i| *i < self.queue.len());
        self.current_index = index;
        self.current_track = index.map(|i| self.queue[i].clone());
        self.position = Duration::ZERO;
        self.duration = Duration::ZERO;
    }

    /// Forget the loaded track but keep the queue and user settings.
    pub(crate) fn reset_playback(&mut self) {
        self.select(None);
        self.status = PlaybackStatus::Idle;
    }

    /// Empty queue and idle transport. Volume, rate, repeat mode and the
    /// shuffle preference survive.
    pub(crate) fn clear(&mut self) {
        self.reset_playback();
        self.queue.clear();
        self.track_index_map.clear();
        self.unshuffled = self.is_shuffled.then(Vec::new);
    }

    /// Record a progress report, keeping `position <= duration`.
    pub(crate) fn set_progress(&mut self, position: Duration, duration: Duration) {
        if !duration.is_zero() {
            self.duration = duration;
        }
        self.position = if self.duration.is_zero() {
            position
        } else {
            position.min(self.duration)
        };
    }

    pub(crate) fn rebuild_index_map(&mut self) {
        self.track_index_map.clear();
        for (index, track) in self.queue.iter().enumerate() {
            self.track_index_map.entry(track.id.clone()).or_insert(index);
        }
    }

    /// `true` when every documented invariant holds.
    pub fn is_consistent(&self) -> bool {
        let index_ok = match self.current_index {
            Some(i) => i < self.queue.len(),
            None => true,
        };
        let track_ok = self.current_track.is_some() == self.current_index.is_some();
        let position_ok = self.duration.is_zero() || self.position <= self.duration;
        let map_ok = self.track_index_map.len()
            <= self.queue.len()
            && self
                .track_index_map
                .iter()
                .all(|(id, i)| self.queue.get(*i).is_some_and(|t| &t.id == id));
        index_ok && track_ok && position_ok && map_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(ids: &[&str]) -> Vec<Track> {
        ids.iter().map(|id| Track::new(*id, *id, "local")).collect()
    }

    #[test]
    fn test_new_state_is_idle() {
        let state = PlaybackState::new(0.4);
        assert_eq!(state.status, PlaybackStatus::Idle);
        assert_eq!(state.volume, 0.4);
        assert!(state.current_track.is_none());
        assert!(state.is_consistent());
    }

    #[test]
    fn test_select_keeps_track_and_index_in_step() {
        let mut state = PlaybackState::default();
        state.queue = queue(&["a", "b"]);
        state.rebuild_index_map();

        state.select(Some(1));
        assert_eq!(state.current_track.as_ref().unwrap().id, "b");
        assert!(state.is_consistent());

        state.select(Some(9));
        assert!(state.current_track.is_none());
        assert!(state.current_index.is_none());
    }

    #[test]
    fn test_progress_never_exceeds_duration() {
        let mut state = PlaybackState::default();
        state.set_progress(Duration::from_secs(5), Duration::from_secs(200));
        assert_eq!(state.position, Duration::from_secs(5));

        state.set_progress(Duration::from_secs(250), Duration::ZERO);
        assert_eq!(state.position, Duration::from_secs(200));
    }

    #[test]
    fn test_clear_keeps_preferences() {
        let mut state = PlaybackState::new(0.3);
        state.queue = queue(&["a", "b"]);
        state.rebuild_index_map();
        state.select(Some(0));
        state.repeat_mode = RepeatMode::All;
        state.status = PlaybackStatus::Playing;

        state.clear();
        assert!(state.queue.is_empty());
        assert!(state.track_index_map.is_empty());
        assert_eq!(state.status, PlaybackStatus::Idle);
        assert_eq!(state.repeat_mode, RepeatMode::All);
        assert_eq!(state.volume, 0.3);
    }

    #[test]
    fn test_index_map_points_at_first_duplicate() {
        let mut state = PlaybackState::default();
        state.queue = queue(&["a", "b", "a"]);
        state.rebuild_index_map();
        assert_eq!(state.index_of("a"), Some(0));
        assert_eq!(state.index_of("b"), Some(1));
        assert!(state.is_consistent());
    }
}
