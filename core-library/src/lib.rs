//! # Library Value Types
//!
//! Domain values shared by the plugin runtime, the playback engine and the
//! metadata services.
//!
//! ## Overview
//!
//! This crate holds:
//! - `Track`, `Artist` and `Album` as handed out by provider plugins
//! - `Lyrics` with LRC parsing and position lookup
//! - `QueueItem`, the read-only view over a playback queue
//! - `RepeatMode`
//! - Duration formatting, parsing and millisecond serde helpers
//!
//! Nothing here performs I/O. Persistence of these values belongs to the host.

pub mod duration;
pub mod error;
pub mod models;

pub use duration::{format_duration, parse_duration};
pub use error::{LibraryError, Result};
pub use models::{Album, Artist, LyricLine, Lyrics, QueueItem, RepeatMode, Track};
