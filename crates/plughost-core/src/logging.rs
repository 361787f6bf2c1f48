//! In-memory log sink flushed to a timestamped file at shutdown.
//!
//! [`LogSink`] collects events from any thread without blocking the emitter
//! for I/O. [`LogSinkLayer`] feeds it from `tracing`, so everything the host
//! and its extensions log ends up in the file written by
//! [`LogSink::flush_to`].

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Timestamp format inside a log line.
pub const LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// File name format of a flushed log, without the `.log` suffix.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Field carrying the extension name; used as the event source when present.
pub const SOURCE_FIELD: &str = "extension";

/// One captured log event.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    #[serde(serialize_with = "serialize_level")]
    pub level: Level,
    pub source: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: Level, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            source: source.into(),
            message: message.into(),
        }
    }

    /// `[<prefix>-<LEVEL>-<timestamp>] <source> <message>`
    pub fn format_line(&self, prefix: &str) -> String {
        format!(
            "[{}-{}-{}] {} {}",
            prefix,
            self.level,
            self.timestamp.format(LINE_TIMESTAMP_FORMAT),
            self.source,
            self.message
        )
    }
}

fn serialize_level<S: serde::Serializer>(level: &Level, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(level.as_str())
}

struct SinkInner {
    prefix: String,
    events: Mutex<Vec<LogEvent>>,
    flushed: AtomicBool,
}

/// Shared, append-only event buffer.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<SinkInner>,
}

impl LogSink {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                prefix: prefix.into(),
                events: Mutex::new(Vec::new()),
                flushed: AtomicBool::new(false),
            }),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    pub fn append(&self, event: LogEvent) {
        self.inner.events.lock().push(event);
    }

    pub fn record(&self, level: Level, source: &str, message: impl Into<String>) {
        self.append(LogEvent::new(level, source, message));
    }

    pub fn len(&self) -> usize {
        self.inner.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the buffered events, in append order.
    pub fn snapshot(&self) -> Vec<LogEvent> {
        self.inner.events.lock().clone()
    }

    /// `tracing` layer feeding this sink.
    pub fn layer(&self) -> LogSinkLayer {
        LogSinkLayer { sink: self.clone() }
    }

    /// Write every buffered event to `{dir}/{yyyyMMdd_HHmmss}.log`.
    ///
    /// Runs at most once per sink; later calls return `Ok(None)`. The
    /// directory is created when missing.
    pub fn flush_to(&self, dir: &Path) -> std::io::Result<Option<PathBuf>> {
        if self.inner.flushed.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }

        let events = std::mem::take(&mut *self.inner.events.lock());
        let mut contents = String::new();
        for event in &events {
            let _ = writeln!(contents, "{}", event.format_line(&self.inner.prefix));
        }

        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.log", Local::now().format(FILE_TIMESTAMP_FORMAT)));
        std::fs::write(&path, contents)?;
        Ok(Some(path))
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("prefix", &self.inner.prefix)
            .field("events", &self.len())
            .finish()
    }
}

/// `tracing_subscriber` layer that copies events into a [`LogSink`].
#[derive(Clone, Debug)]
pub struct LogSinkLayer {
    sink: LogSink,
}

impl<S: Subscriber> Layer<S> for LogSinkLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let meta = event.metadata();
        let source = visitor
            .source
            .unwrap_or_else(|| meta.target().to_string());
        let mut message = visitor.message;
        if !visitor.fields.is_empty() {
            if !message.is_empty() {
                message.push(' ');
            }
            message.push_str(&visitor.fields);
        }

        self.sink.append(LogEvent::new(*meta.level(), source, message));
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    source: Option<String>,
    fields: String,
}

impl EventVisitor {
    fn push_field(&mut self, name: &str, value: &dyn std::fmt::Display) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", name, value);
    }
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            SOURCE_FIELD => self.source = Some(value.to_string()),
            name => self.push_field(name, &value),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            SOURCE_FIELD => self.source = Some(format!("{:?}", value)),
            name => self.push_field(name, &format_args!("{:?}", value)),
        }
    }
}
