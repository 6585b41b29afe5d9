//! Structured statement events and the sinks that receive them.
//!
//! Every operation on a [`Database`](crate::Database) reports engine errors
//! to the configured [`LogSink`]; with a [`TraceMode`] set it also reports
//! each statement before it runs or after it finishes.
//!
//! Any `Fn(&LogEvent) + Send + Sync` closure is a sink:
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use sqlmigrate_sqlite::{ConnectionOptions, LogEvent};
//!
//! let events: Arc<Mutex<Vec<LogEvent>>> = Arc::default();
//! let captured = Arc::clone(&events);
//! let options = ConnectionOptions::default()
//!     .with_sink(move |event: &LogEvent| captured.lock().unwrap().push(event.clone()));
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlmigrate_core::TraceMode;
use tracing::{error, trace};

/// Severity of a [`LogEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Error,
}

/// One statement-level event.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub level: LogLevel,
    /// Operation that produced the event (`"run"`, `"exec"`, ...).
    pub channel: &'static str,
    pub sql: Option<String>,
    /// Execution time; only set on [`TraceMode::Finish`] events.
    pub time: Option<Duration>,
    /// Rendered error; only set on error events.
    pub error: Option<String>,
}

impl LogEvent {
    /// A trace event for `sql` on `channel`.
    pub fn trace(channel: &'static str, sql: Option<&str>) -> Self {
        Self {
            level: LogLevel::Trace,
            channel,
            sql: sql.map(str::to_string),
            time: None,
            error: None,
        }
    }

    /// An error event carrying the rendered `err`.
    pub fn error(channel: &'static str, sql: Option<&str>, err: &dyn std::fmt::Display) -> Self {
        Self {
            level: LogLevel::Error,
            channel,
            sql: sql.map(str::to_string),
            time: None,
            error: Some(err.to_string()),
        }
    }

    /// Builder method to attach a duration.
    pub fn with_time(mut self, time: Duration) -> Self {
        self.time = Some(time);
        self
    }
}

/// Receiver of [`LogEvent`]s.
///
/// Sinks are called on the connection's executor thread and must not block.
pub trait LogSink: Send + Sync {
    fn log(&self, event: &LogEvent);
}

impl<F> LogSink for F
where
    F: Fn(&LogEvent) + Send + Sync,
{
    fn log(&self, event: &LogEvent) {
        self(event)
    }
}

/// Default sink: forwards events to `tracing`.
///
/// Trace events go to `trace!`, error events to `error!`, both with the
/// channel and SQL as fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, event: &LogEvent) {
        let sql = event.sql.as_deref().unwrap_or_default();
        match event.level {
            LogLevel::Trace => match event.time {
                Some(time) => trace!(
                    channel = event.channel,
                    sql,
                    time_ms = time.as_secs_f64() * 1000.0,
                    "statement finished"
                ),
                None => trace!(channel = event.channel, sql, "statement"),
            },
            LogLevel::Error => error!(
                channel = event.channel,
                sql,
                error = event.error.as_deref().unwrap_or_default(),
                "statement failed"
            ),
        }
    }
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _event: &LogEvent) {}
}

/// Trace policy plus sink, shared by every statement issued on a connection.
#[derive(Clone)]
pub(crate) struct Tracer {
    mode: Option<TraceMode>,
    sink: Arc<dyn LogSink>,
}

impl Tracer {
    pub(crate) fn new(mode: Option<TraceMode>, sink: Arc<dyn LogSink>) -> Self {
        Self { mode, sink }
    }

    pub(crate) fn report(&self, event: LogEvent) {
        self.sink.log(&event);
    }

    /// Runs `f`, reporting it according to the trace mode and reporting
    /// any failure as an error event.
    pub(crate) fn observe<T, E: std::fmt::Display>(
        &self,
        channel: &'static str,
        sql: Option<&str>,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        if self.mode == Some(TraceMode::Run) {
            self.report(LogEvent::trace(channel, sql));
        }
        let started = Instant::now();
        let result = f();
        match &result {
            Ok(_) if self.mode == Some(TraceMode::Finish) => {
                self.report(LogEvent::trace(channel, sql).with_time(started.elapsed()));
            }
            Ok(_) => {}
            Err(err) => self.report(LogEvent::error(channel, sql, err)),
        }
        result
    }
}

/// Engine trace hook installed for verbose connections.
pub(crate) fn engine_trace(sql: &str) {
    trace!(target: "sqlmigrate::engine", sql, "engine trace");
}

/// Engine profile hook installed for verbose connections.
pub(crate) fn engine_profile(sql: &str, elapsed: Duration) {
    trace!(
        target: "sqlmigrate::engine",
        sql,
        time_ms = elapsed.as_secs_f64() * 1000.0,
        "engine profile"
    );
}
