//! Collaborators and run log shared by every command of one run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use serde::Serialize;

use crate::settings::Settings;
use crate::surface::AutomationSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Local wall clock, `HH:MM:SS`.
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] [{}] {}", self.timestamp, self.level, self.message)
    }
}

/// Timing of every cooperative wait in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Sleep between polls of the load-finished flag and other waits.
    pub poll_interval: Duration,
    pub load_timeout: Duration,
    /// Extra wait after load-finished; the signal fires before painting is done.
    pub settle_delay: Duration,
    /// Sleep between checks while the executor is paused.
    pub pause_poll_interval: Duration,
    /// Call `AutomationSurface::process_events` on every polling iteration.
    pub drain_events: bool,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            load_timeout: Duration::from_millis(30_000),
            settle_delay: Duration::from_millis(1_000),
            pause_poll_interval: Duration::from_millis(100),
            drain_events: true,
        }
    }
}

impl WaitPolicy {
    /// No settle delay and short polls; for headless dry runs and tests.
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            load_timeout: Duration::from_millis(200),
            settle_delay: Duration::ZERO,
            pause_poll_interval: Duration::from_millis(1),
            drain_events: true,
        }
    }
}

pub type LogSink = Box<dyn Fn(&LogEntry) + Send>;

pub struct ExecutionContext {
    pub surface: Option<Box<dyn AutomationSurface>>,
    pub settings: Option<Arc<dyn Settings>>,
    pub wait: WaitPolicy,
    pub stop_on_error: bool,
    /// Declared for parity with the settings UI; no control flow reads it.
    pub pause_on_error: bool,
    /// Mirror entries to `tracing`.
    pub mirror: bool,
    sink: Option<LogSink>,
    logs: Vec<LogEntry>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            surface: None,
            settings: None,
            wait: WaitPolicy::default(),
            stop_on_error: false,
            pause_on_error: false,
            mirror: true,
            sink: None,
            logs: Vec::new(),
        }
    }

    pub fn with_surface(mut self, surface: impl AutomationSurface + 'static) -> Self {
        self.surface = Some(Box::new(surface));
        self
    }

    pub fn with_settings(mut self, settings: Arc<dyn Settings>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Forward every new entry to `sink` as well as the in-memory log.
    pub fn set_sink(&mut self, sink: LogSink) {
        self.sink = Some(sink);
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.log_at(LogLevel::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.log_at(LogLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log_at(LogLevel::Error, message);
    }

    pub fn log_at(&mut self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            level,
            message: message.into(),
        };

        if self.mirror {
            let message = entry.message.as_str();
            match level {
                LogLevel::Debug => tracing::debug!(target: "qwsengine::script", "{message}"),
                LogLevel::Info => tracing::info!(target: "qwsengine::script", "{message}"),
                LogLevel::Warning => tracing::warn!(target: "qwsengine::script", "{message}"),
                LogLevel::Error => tracing::error!(target: "qwsengine::script", "{message}"),
            }
        }
        if let Some(sink) = &self.sink {
            sink(&entry);
        }
        self.logs.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Formatted copy of the log.
    pub fn logs(&self) -> Vec<String> {
        self.logs.iter().map(ToString::to_string).collect()
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
    }

    /// Drain host events on the surface, if there is one and the policy asks for it.
    pub(crate) fn drain_events(&mut self) {
        if !self.wait.drain_events {
            return;
        }
        if let Some(surface) = self.surface.as_deref_mut() {
            surface.process_events();
        }
    }

    /// Sleep for `total`, draining host events every poll interval.
    pub(crate) fn idle_for(&mut self, total: Duration) {
        let step = self.wait.poll_interval.max(Duration::from_millis(1));
        let mut remaining = total;
        while !remaining.is_zero() {
            self.drain_events();
            let nap = remaining.min(step);
            std::thread::sleep(nap);
            remaining -= nap;
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("surface", &self.surface.is_some())
            .field("settings", &self.settings.is_some())
            .field("wait", &self.wait)
            .field("stop_on_error", &self.stop_on_error)
            .field("pause_on_error", &self.pause_on_error)
            .field("entries", &self.logs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn entries_keep_order_and_format() {
        let mut ctx = ExecutionContext::new();
        ctx.log("first");
        ctx.warn("second");
        ctx.error("third");

        let levels: Vec<_> = ctx.entries().iter().map(|e| e.level).collect();
        assert_eq!(levels, [LogLevel::Info, LogLevel::Warning, LogLevel::Error]);

        let lines = ctx.logs();
        assert!(lines[0].ends_with("[INFO] first"), "{}", lines[0]);
        assert!(lines[1].ends_with("[WARNING] second"));
        assert_eq!(lines[2].len(), "[12:34:56] [ERROR] third".len());

        ctx.clear_logs();
        assert!(ctx.entries().is_empty());
    }

    #[test]
    fn sink_sees_every_entry() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let mut ctx = ExecutionContext::new().with_sink(Box::new(move |entry| {
            captured.lock().unwrap().push(entry.message.clone());
        }));

        ctx.log("a");
        ctx.error("b");

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }
}
