//! Host log forwarding.
//!
//! The core logs through `tracing`. Hosts that want those records in their
//! own pipeline (OSLog, Logcat, a file) implement [`LoggerSink`]; the
//! `core-runtime` logging layer converts each event into a [`LogEntry`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{error::Result, platform::PlatformSendSync};

/// Severity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// One forwarded log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Module path the event came from, e.g. `core_playback::provider`
    pub target: String,
    pub message: String,
    /// Structured fields, already redacted
    #[serde(default)]
    pub fields: HashMap<String, String>,
    /// Innermost span the event was recorded in
    #[serde(default)]
    pub span: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn in_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }
}

/// Receives log records from the core.
///
/// Stream URLs and request headers arrive redacted; implementations do not
/// need to scrub them again.
#[async_trait::async_trait]
pub trait LoggerSink: PlatformSendSync {
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Records below this level are never sent.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered_by_severity() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!(serde_json::to_string(&LogLevel::Warn).unwrap(), "\"warn\"");
    }

    #[test]
    fn test_entry_builder() {
        let entry = LogEntry::new(LogLevel::Info, "core_plugins::registry", "Plugin activated")
            .with_field("plugin_id", "spotify")
            .in_span("activate");

        assert_eq!(entry.fields.get("plugin_id").map(String::as_str), Some("spotify"));
        assert_eq!(entry.span.as_deref(), Some("activate"));
    }
}
