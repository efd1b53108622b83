//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the media core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system carrying playback and plugin events
//!
//! ## Overview
//!
//! Every other `core-*` crate depends on this one for its logging
//! conventions, its configuration types and the event vocabulary it
//! publishes to hosts.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream, PlaybackEvent, PlaybackStatus, PluginEvent};
