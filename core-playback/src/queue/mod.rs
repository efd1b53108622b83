//! # Queue
//!
//! - [`QueueManager`]: pure index arithmetic over a `PlaybackState`
//! - [`QueueHandler`]: the same operations, publishing `queue-change` events

mod handler;
mod manager;

pub use handler::QueueHandler;
pub use manager::{PreviousAction, QueueManager, Removal, TrackEndAction};
