//! # Host Bridge Traits
//!
//! Contracts between the media core and the host application.
//!
//! ## Overview
//!
//! Each trait represents a capability the core needs but does not own. The
//! host injects an implementation at startup; the core never reaches for a
//! global.
//!
//! ## Traits
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences (persisted volume, etc.)
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for TTL bookkeeping and deterministic testing
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform-specific failures into it with an actionable message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across async
//! tasks behind an `Arc`.

pub mod error;
pub mod log;
pub mod platform;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use storage::{MemorySettingsStore, SettingsStore};
pub use log::{LogEntry, LogLevel, LoggerSink};
pub use time::{Clock, ManualClock, SystemClock};
