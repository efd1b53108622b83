//! # Logging & Tracing Infrastructure
//!
//! Installs the global `tracing` subscriber for the core:
//! - one `fmt` layer in pretty, JSON or compact form
//! - an `EnvFilter` that keeps the core crates at the configured level and
//!   everything else at `warn`
//! - an optional [`LoggerSink`] bridge that mirrors every event passing the
//!   filter to the host
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::LogLevel;
//!
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Compact)
//!     .with_level(LogLevel::Debug)
//!     .with_logger_sink(host_sink);
//!
//! init_logging(config)?;
//! tracing::info!("Playback core started");
//! ```
//!
//! ## What never reaches the logs
//!
//! Resolved stream URLs carry signed tokens in their query string, and request
//! headers usually carry credentials. Log URLs through [`redact_stream_url`]
//! and header values through [`redact_if_sensitive`].

use crate::error::{Error, Result};

use bridge_traits::log::{LogEntry, LogLevel, LoggerSink};
use core_async::runtime;

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{
    filter::EnvFilter,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer, Registry,
};

/// Crates whose events pass the default filter at the configured level.
const CORE_TARGETS: &[&str] = &[
    "core_async",
    "core_runtime",
    "core_library",
    "core_plugins",
    "core_playback",
    "core_metadata",
    "core_service",
];

/// Field names whose values are always replaced.
const SENSITIVE_FIELDS: &[&str] = &[
    "token",
    "password",
    "secret",
    "api_key",
    "authorization",
    "cookie",
    "signature",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored; for local development
    Pretty,
    /// One JSON object per line
    Json,
    /// Single-line text
    Compact,
}

impl Default for LogFormat {
    /// `Pretty` in debug builds, `Json` otherwise.
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level for the core crates when no custom filter is set
    pub level: LogLevel,
    /// Full `EnvFilter` directive string, replaces the default filter
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Print span enter/exit (text formats) or span context (JSON)
    pub enable_spans: bool,
    pub display_target: bool,
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            enable_spans: true,
            display_target: true,
            display_thread_info: false,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("logger_sink", &self.logger_sink.is_some())
            .field("enable_spans", &self.enable_spans)
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// e.g. `"core_plugins=debug,core_playback=trace"`
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }
}

/// Install the global subscriber.
///
/// Only the first call in a process succeeds; later calls return
/// [`Error::Config`] and leave the installed subscriber alone.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;

    tracing_subscriber::registry()
        .with(fmt_layer(&config))
        .with(filter)
        .with(LoggerSinkLayer::new(config.logger_sink.clone()))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = match &config.filter {
        Some(custom) => custom.clone(),
        None => {
            let level = level_directive(config.level);
            std::iter::once("warn".to_string())
                .chain(CORE_TARGETS.iter().map(|target| format!("{target}={level}")))
                .collect::<Vec<_>>()
                .join(",")
        }
    };

    EnvFilter::try_new(directives).map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

fn fmt_layer(config: &LoggingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let spans = if config.enable_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };
    let base = tracing_subscriber::fmt::layer()
        .with_target(config.display_target)
        .with_thread_ids(config.display_thread_info)
        .with_thread_names(config.display_thread_info)
        .with_writer(io::stdout);

    match config.format {
        LogFormat::Pretty => base.pretty().with_span_events(spans).boxed(),
        LogFormat::Compact => base.compact().with_span_events(spans).boxed(),
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(config.enable_spans)
            .boxed(),
    }
}

/// Mirrors events to the host [`LoggerSink`].
///
/// Inside a runtime the sink call is spawned; outside one it is driven to
/// completion on a throwaway current-thread runtime.
struct LoggerSinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl LoggerSinkLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let metadata = event.metadata();
        let level = log_level(*metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        entry.fields = visitor.fields;
        if let Some(span) = ctx.lookup_current() {
            entry = entry.in_span(span.name());
        }

        let sink = Arc::clone(sink);
        if let Ok(handle) = runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = sink.log(entry).await {
                    eprintln!("LoggerSink error: {}", err);
                }
            });
            return;
        }

        match runtime::block_on(async move { sink.log(entry).await }) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => eprintln!("LoggerSink error: {}", err),
            Err(err) => eprintln!("LoggerSink runtime error: {}", err),
        }
    }
}

/// Collects event fields as strings; sensitive names are redacted on the way.
#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: HashMap<String, String>,
}

impl FieldCollector {
    fn record_value(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                let value = redact_if_sensitive(name, &value);
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record_value(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_value(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, format!("{:?}", value));
    }
}

fn log_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

/// `[REDACTED]` if `field_name` looks like it holds a credential, `value`
/// otherwise.
///
/// ```
/// use core_runtime::logging::redact_if_sensitive;
///
/// assert_eq!(redact_if_sensitive("Authorization", "Bearer abc"), "[REDACTED]");
/// assert_eq!(redact_if_sensitive("track_id", "t-42"), "t-42");
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    let name = field_name.to_lowercase();
    if SENSITIVE_FIELDS.iter().any(|s| name.contains(s)) {
        "[REDACTED]".to_string()
    } else {
        value.to_string()
    }
}

/// Redact the parts of a stream URL that carry credentials.
///
/// Userinfo, query string and fragment are replaced; scheme, host and path
/// are kept so the log still says *where* playback was pointed.
///
/// ```
/// use core_runtime::logging::redact_stream_url;
///
/// assert_eq!(
///     redact_stream_url("https://cdn.example.com/a.mp3?sig=abc"),
///     "https://cdn.example.com/a.mp3?[REDACTED]"
/// );
/// ```
pub fn redact_stream_url(url: &str) -> String {
    let (base, stripped) = match url.find(&['?', '#'][..]) {
        Some(idx) => (&url[..idx], true),
        None => (url, false),
    };

    let base = match base.find("://") {
        Some(scheme_end) => {
            let authority_start = scheme_end + 3;
            let authority_end = base[authority_start..]
                .find('/')
                .map(|i| authority_start + i)
                .unwrap_or(base.len());
            match base[authority_start..authority_end].rfind('@') {
                Some(at) => format!(
                    "{}[REDACTED]{}",
                    &base[..authority_start],
                    &base[authority_start + at..]
                ),
                None => base.to_string(),
            }
        }
        None => base.to_string(),
    };

    if stripped {
        format!("{}?[REDACTED]", base)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    struct CollectingSink {
        entries: Mutex<Vec<LogEntry>>,
        min: LogLevel,
    }

    impl CollectingSink {
        fn new(min: LogLevel) -> Arc<Self> {
            Arc::new(Self {
                entries: Mutex::new(Vec::new()),
                min,
            })
        }
    }

    #[async_trait]
    impl LoggerSink for CollectingSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            self.min
        }
    }

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_level(LogLevel::Debug)
            .with_filter("core_plugins=trace")
            .with_spans(false)
            .with_thread_info(true);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.filter.as_deref(), Some("core_plugins=trace"));
        assert!(!config.enable_spans);
        assert!(config.display_thread_info);
    }

    #[test]
    fn test_default_filter_covers_core_crates() {
        let config = LoggingConfig::default().with_level(LogLevel::Debug);
        let rendered = build_filter(&config).unwrap().to_string().to_lowercase();
        for target in CORE_TARGETS {
            assert!(rendered.contains(&format!("{target}=debug")), "{target}");
        }
    }

    #[test]
    fn test_redact_stream_url() {
        assert_eq!(
            redact_stream_url("https://cdn.example.com/t/1.flac?token=abc&exp=1"),
            "https://cdn.example.com/t/1.flac?[REDACTED]"
        );
        assert_eq!(
            redact_stream_url("https://user:pw@host.example/stream#frag"),
            "https://[REDACTED]@host.example/stream?[REDACTED]"
        );
        assert_eq!(redact_stream_url("file:///music/song.mp3"), "file:///music/song.mp3");
    }

    #[test]
    fn test_sink_layer_forwards_redacted_fields() {
        let sink = CollectingSink::new(LogLevel::Trace);
        let layer = LoggerSinkLayer::new(Some(sink.clone() as Arc<dyn LoggerSink>));
        let subscriber = tracing_subscriber::registry().with(layer);
        let _guard = tracing::subscriber::set_default(subscriber);

        let span = tracing::info_span!("activate");
        let _entered = span.enter();
        tracing::info!(
            target: "core_plugins::registry",
            plugin_id = "spotify",
            api_key = "k-123",
            "Plugin activated"
        );

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.target, "core_plugins::registry");
        assert_eq!(entry.message, "Plugin activated");
        assert_eq!(entry.fields.get("plugin_id").map(String::as_str), Some("spotify"));
        assert_eq!(entry.fields.get("api_key").map(String::as_str), Some("[REDACTED]"));
        assert_eq!(entry.span.as_deref(), Some("activate"));
    }

    #[test]
    fn test_sink_layer_respects_min_level() {
        let sink = CollectingSink::new(LogLevel::Warn);
        let subscriber = tracing_subscriber::registry()
            .with(LoggerSinkLayer::new(Some(sink.clone() as Arc<dyn LoggerSink>)));
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::info!("below threshold");
        tracing::warn!("at threshold");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "at threshold");
    }
}
