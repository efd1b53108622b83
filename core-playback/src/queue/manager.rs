//! Queue arithmetic.
//!
//! [`QueueManager`] only rearranges a [`PlaybackState`]; it never talks to the
//! transport or emits events. The provider turns the returned decisions
//! ([`PreviousAction`], [`TrackEndAction`], ...) into transport calls.

use core_library::models::{RepeatMode, Track};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::Duration;

use crate::error::{PlaybackError, Result};
use crate::state::PlaybackState;

/// What `skip_to_previous` should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviousAction {
    /// Seek the current track back to zero.
    Restart,
    /// Load the track at this index.
    Load(usize),
}

/// What to do when the loaded track finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEndAction {
    /// Repeat one: seek to zero and keep playing.
    Restart,
    /// Load the next index.
    Advance(usize),
    /// Repeat all at the end of the queue: load index 0.
    Wrap,
    /// End of queue: stop and report `ended`.
    Stop,
}

/// Outcome of removing a queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// The playing entry was removed; playback state is now idle.
    Active(Track),
    Inactive(Track),
}

pub struct QueueManager {
    rng: Mutex<StdRng>,
    restart_threshold: Duration,
}

impl QueueManager {
    pub fn new(restart_threshold: Duration) -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            restart_threshold,
        }
    }

    /// Deterministic shuffle order.
    pub fn with_seed(restart_threshold: Duration, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            restart_threshold,
        }
    }

    pub fn restart_threshold(&self) -> Duration {
        self.restart_threshold
    }

    /// Replace the queue. Returns the index to start playing, or `None` for
    /// an empty queue.
    ///
    /// With shuffle on, the given order is captured and the start track is
    /// moved to the front of the shuffled queue.
    pub fn set_queue(
        &self,
        state: &mut PlaybackState,
        tracks: Vec<Track>,
        start_index: usize,
    ) -> Result<Option<usize>> {
        if tracks.is_empty() {
            state.clear();
            return Ok(None);
        }
        if start_index >= tracks.len() {
            return Err(PlaybackError::QueueIndexOutOfRange {
                index: start_index,
                len: tracks.len(),
            });
        }

        let start = if state.is_shuffled {
            state.unshuffled = Some(tracks.clone());
            state.queue = tracks;
            self.shuffle_around(state, Some(start_index))
        } else {
            state.queue = tracks;
            start_index
        };

        state.rebuild_index_map();
        state.select(Some(start));
        Ok(Some(start))
    }

    /// Insert `tracks` at `at` (appending when `None` or out of range).
    /// Returns the index of the first inserted track.
    pub fn add(&self, state: &mut PlaybackState, tracks: Vec<Track>, at: Option<usize>) -> usize {
        let len = state.queue.len();
        let index = at.filter(|i| *i <= len).unwrap_or(len);
        let count = tracks.len();
        if count == 0 {
            return index;
        }

        if let Some(original) = state.unshuffled.as_mut() {
            original.extend(tracks.iter().cloned());
        }
        state.queue.splice(index..index, tracks);

        if let Some(current) = state.current_index {
            if index <= current {
                state.current_index = Some(current + count);
            }
        }
        state.rebuild_index_map();
        index
    }

    /// Remove one entry. Removing the active entry resets playback to idle
    /// but keeps the rest of the queue.
    pub fn remove(&self, state: &mut PlaybackState, index: usize) -> Result<Removal> {
        if index >= state.queue.len() {
            return Err(PlaybackError::QueueIndexOutOfRange {
                index,
                len: state.queue.len(),
            });
        }

        let removed = state.queue.remove(index);
        if let Some(original) = state.unshuffled.as_mut() {
            if let Some(pos) = original.iter().position(|t| t.id == removed.id) {
                original.remove(pos);
            }
        }
        state.rebuild_index_map();

        match state.current_index {
            Some(current) if current == index => {
                state.reset_playback();
                Ok(Removal::Active(removed))
            }
            Some(current) if index < current => {
                state.current_index = Some(current - 1);
                Ok(Removal::Inactive(removed))
            }
            _ => Ok(Removal::Inactive(removed)),
        }
    }

    pub fn clear(&self, state: &mut PlaybackState) {
        state.clear();
    }

    /// Index `skip_to_next` should load, or `None` if there is no next track.
    pub fn next_index(&self, state: &PlaybackState) -> Option<usize> {
        let len = state.queue.len();
        if len == 0 {
            return None;
        }
        match state.current_index {
            None => Some(0),
            Some(current) if current + 1 < len => Some(current + 1),
            Some(_) if state.repeat_mode == RepeatMode::All => Some(0),
            Some(_) => None,
        }
    }

    /// Restart-vs-rewind decision for `skip_to_previous`. `None` when the
    /// queue is empty.
    pub fn previous(&self, state: &PlaybackState) -> Option<PreviousAction> {
        if state.queue.is_empty() {
            return None;
        }
        match state.current_index {
            None => Some(PreviousAction::Load(0)),
            Some(_) if state.position > self.restart_threshold => Some(PreviousAction::Restart),
            Some(0) => Some(PreviousAction::Restart),
            Some(current) => Some(PreviousAction::Load(current - 1)),
        }
    }

    /// Decide how to continue once the loaded track has finished.
    pub fn on_track_end(&self, state: &PlaybackState) -> TrackEndAction {
        let len = state.queue.len();
        match (state.repeat_mode, state.current_index) {
            (_, None) => TrackEndAction::Stop,
            (RepeatMode::One, Some(_)) => TrackEndAction::Restart,
            (_, Some(current)) if current + 1 < len => TrackEndAction::Advance(current + 1),
            (RepeatMode::All, Some(_)) => TrackEndAction::Wrap,
            (RepeatMode::Off, Some(_)) => TrackEndAction::Stop,
        }
    }

    pub fn check_index(&self, state: &PlaybackState, index: usize) -> Result<()> {
        if index < state.queue.len() {
            Ok(())
        } else {
            Err(PlaybackError::QueueIndexOutOfRange {
                index,
                len: state.queue.len(),
            })
        }
    }

    /// Toggle shuffle. Switching off restores the exact captured order.
    /// Returns the new shuffle flag.
    pub fn toggle_shuffle(&self, state: &mut PlaybackState) -> bool {
        if state.is_shuffled {
            let current_id = state.current_track.as_ref().map(|t| t.id.clone());
            if let Some(original) = state.unshuffled.take() {
                state.queue = original;
            }
            state.is_shuffled = false;
            state.rebuild_index_map();
            state.current_index = current_id.and_then(|id| state.index_of(&id));
        } else {
            state.unshuffled = Some(state.queue.clone());
            state.is_shuffled = true;
            let current = state.current_index;
            let front = self.shuffle_around(state, current);
            state.rebuild_index_map();
            if current.is_some() {
                state.current_index = Some(front);
            }
        }
        state.is_shuffled
    }

    pub fn cycle_repeat(&self, state: &mut PlaybackState) -> RepeatMode {
        state.repeat_mode = state.repeat_mode.next();
        state.repeat_mode
    }

    /// Shuffle the queue in place, keeping `anchor` (if any) at index 0.
    /// Returns the new index of the anchor.
    fn shuffle_around(&self, state: &mut PlaybackState, anchor: Option<usize>) -> usize {
        let mut rng = self.rng.lock();
        match anchor {
            Some(index) if index < state.queue.len() => {
                let pinned = state.queue.remove(index);
                state.queue.shuffle(&mut *rng);
                state.queue.insert(0, pinned);
            }
            _ => state.queue.shuffle(&mut *rng),
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_runtime::PlaybackStatus;

    fn tracks(ids: &[&str]) -> Vec<Track> {
        ids.iter().map(|id| Track::new(*id, *id, "local")).collect()
    }

    fn ids(state: &PlaybackState) -> Vec<&str> {
        state.queue.iter().map(|t| t.id.as_str()).collect()
    }

    fn manager() -> QueueManager {
        QueueManager::with_seed(Duration::from_secs(3), 7)
    }

    fn playing(ids: &[&str], index: usize) -> PlaybackState {
        let mut state = PlaybackState::default();
        manager().set_queue(&mut state, tracks(ids), index).unwrap();
        state.status = PlaybackStatus::Playing;
        state
    }

    #[test]
    fn test_set_queue_selects_start() {
        let state = playing(&["a", "b", "c"], 1);
        assert_eq!(state.current_index, Some(1));
        assert_eq!(state.current_track.as_ref().unwrap().id, "b");
        assert!(state.is_consistent());

        let mut state = PlaybackState::default();
        let err = manager().set_queue(&mut state, tracks(&["a"]), 3).unwrap_err();
        assert_eq!(err, PlaybackError::QueueIndexOutOfRange { index: 3, len: 1 });
    }

    #[test]
    fn test_insert_before_current_shifts_index() {
        let mut state = playing(&["a", "b", "c"], 1);
        manager().add(&mut state, tracks(&["x", "y"]), Some(1));
        assert_eq!(ids(&state), vec!["a", "x", "y", "b", "c"]);
        assert_eq!(state.current_index, Some(3));
        assert_eq!(state.current_track.as_ref().unwrap().id, "b");
        assert!(state.is_consistent());
    }

    #[test]
    fn test_insert_after_current_keeps_index() {
        let mut state = playing(&["a", "b", "c"], 1);
        manager().add(&mut state, tracks(&["x"]), Some(2));
        assert_eq!(state.current_index, Some(1));

        // Out-of-range positions append
        let at = manager().add(&mut state, tracks(&["z"]), Some(99));
        assert_eq!(at, 4);
        assert_eq!(ids(&state), vec!["a", "b", "x", "c", "z"]);
    }

    #[test]
    fn test_remove_before_current_decrements() {
        let mut state = playing(&["a", "b", "c"], 2);
        let removal = manager().remove(&mut state, 0).unwrap();
        assert!(matches!(removal, Removal::Inactive(t) if t.id == "a"));
        assert_eq!(state.current_index, Some(1));
        assert_eq!(state.current_track.as_ref().unwrap().id, "c");
        assert!(state.is_consistent());
    }

    #[test]
    fn test_remove_active_resets_to_idle() {
        let mut state = playing(&["a", "b", "c"], 1);
        state.position = Duration::from_secs(42);
        let removal = manager().remove(&mut state, 1).unwrap();
        assert!(matches!(removal, Removal::Active(_)));
        assert!(state.current_track.is_none());
        assert!(state.current_index.is_none());
        assert_eq!(state.position, Duration::ZERO);
        assert_eq!(state.status, PlaybackStatus::Idle);
        assert_eq!(ids(&state), vec!["a", "c"]);
    }

    #[test]
    fn test_remove_after_current_unchanged() {
        let mut state = playing(&["a", "b", "c"], 0);
        manager().remove(&mut state, 2).unwrap();
        assert_eq!(state.current_index, Some(0));
        assert!(manager().remove(&mut state, 5).is_err());
    }

    #[test]
    fn test_next_index_respects_repeat() {
        let mut state = playing(&["a", "b"], 0);
        assert_eq!(manager().next_index(&state), Some(1));

        state.select(Some(1));
        assert_eq!(manager().next_index(&state), None);

        state.repeat_mode = RepeatMode::All;
        assert_eq!(manager().next_index(&state), Some(0));
    }

    #[test]
    fn test_previous_restart_vs_rewind() {
        let mut state = playing(&["a", "b"], 1);

        state.position = Duration::from_secs(5);
        assert_eq!(manager().previous(&state), Some(PreviousAction::Restart));

        state.position = Duration::from_secs(2);
        assert_eq!(manager().previous(&state), Some(PreviousAction::Load(0)));

        state.select(Some(0));
        assert_eq!(manager().previous(&state), Some(PreviousAction::Restart));

        assert_eq!(manager().previous(&PlaybackState::default()), None);
    }

    #[test]
    fn test_track_end_decisions() {
        let mut state = playing(&["a", "b"], 0);
        assert_eq!(manager().on_track_end(&state), TrackEndAction::Advance(1));

        state.select(Some(1));
        assert_eq!(manager().on_track_end(&state), TrackEndAction::Stop);

        state.repeat_mode = RepeatMode::All;
        assert_eq!(manager().on_track_end(&state), TrackEndAction::Wrap);

        state.repeat_mode = RepeatMode::One;
        assert_eq!(manager().on_track_end(&state), TrackEndAction::Restart);
    }

    #[test]
    fn test_shuffle_round_trip_restores_order() {
        let order = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let mut state = playing(&order, 3);
        let manager = manager();

        assert!(manager.toggle_shuffle(&mut state));
        assert_eq!(state.current_index, Some(0));
        assert_eq!(state.current_track.as_ref().unwrap().id, "d");
        assert_eq!(state.queue[0].id, "d");
        let mut sorted = ids(&state);
        sorted.sort_unstable();
        assert_eq!(sorted, order.to_vec());

        assert!(!manager.toggle_shuffle(&mut state));
        assert_eq!(ids(&state), order.to_vec());
        assert_eq!(state.current_index, Some(3));
        assert!(state.is_consistent());
    }

    #[test]
    fn test_shuffle_tracks_queue_edits() {
        let mut state = playing(&["a", "b", "c"], 0);
        let manager = manager();

        manager.toggle_shuffle(&mut state);
        manager.add(&mut state, tracks(&["d"]), None);
        let last = state.queue.len() - 1;
        let removed_id = state.queue[last - 1].id.clone();
        manager.remove(&mut state, last - 1).unwrap();
        manager.toggle_shuffle(&mut state);

        let expected: Vec<&str> = ["a", "b", "c", "d"]
            .into_iter()
            .filter(|id| *id != removed_id)
            .collect();
        assert_eq!(ids(&state), expected);
    }

    #[test]
    fn test_set_queue_while_shuffled_pins_start_track() {
        let mut state = PlaybackState::default();
        let manager = manager();
        manager.toggle_shuffle(&mut state);

        let start = manager
            .set_queue(&mut state, tracks(&["a", "b", "c", "d"]), 2)
            .unwrap();
        assert_eq!(start, Some(0));
        assert_eq!(state.current_track.as_ref().unwrap().id, "c");

        manager.toggle_shuffle(&mut state);
        assert_eq!(ids(&state), vec!["a", "b", "c", "d"]);
        assert_eq!(state.current_index, Some(2));
    }

    #[test]
    fn test_repeat_cycle() {
        let mut state = PlaybackState::default();
        let manager = manager();
        assert_eq!(manager.cycle_repeat(&mut state), RepeatMode::One);
        assert_eq!(manager.cycle_repeat(&mut state), RepeatMode::All);
        assert_eq!(manager.cycle_repeat(&mut state), RepeatMode::Off);
    }
}
