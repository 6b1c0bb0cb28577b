//! Task-bound structured logging (spec §6's `ExecutionContext` logger):
//! every line goes through `tracing` for the process log, is buffered so
//! it can be written into `task_log.json`'s `logs[]`, and is forwarded
//! live as a `TaskLog` observer event.
use crate::observer::{Event, Observer};
use chrono::Utc;
use colored::Colorize;
use std::sync::{Arc, Mutex};

/// A single captured log line, in the shape `task_log.json` expects.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LogLine {
    pub level: String,
    pub message: String,
}

/// Per-task logger: the single source of truth feeding both the observer's
/// `TaskLog` events and the `logs[]` array written to `task_log.json`.
pub struct TaskLogger {
    task_id: String,
    lines: Mutex<Vec<LogLine>>,
    observer: Arc<dyn Observer>,
}

impl TaskLogger {
    pub fn new(task_id: impl Into<String>, observer: Arc<dyn Observer>) -> Self {
        Self { task_id: task_id.into(), lines: Mutex::new(Vec::new()), observer }
    }

    /// Structured log at `info` level, recorded for later artifact output.
    pub fn log(&self, message: &str) {
        tracing::info!(task_id = %self.task_id, "{}", message);
        self.record("info", message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(task_id = %self.task_id, "{}", message);
        self.record("warn", message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!(task_id = %self.task_id, "{}", message);
        self.record("error", message);
    }

    /// Human-facing colored variant for terminal observers, in addition to
    /// the structured `tracing` line.
    pub fn log_human(&self, message: &str) {
        println!("{} {}", format!("[{}]", self.task_id).cyan(), message);
        self.record("info", message);
    }

    fn record(&self, level: &str, message: &str) {
        let line = LogLine { level: level.to_string(), message: message.to_string() };
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).push(line.clone());
        self.observer.on_event(Event::TaskLog { task_id: self.task_id.clone(), line, at: Utc::now() });
    }

    /// Snapshot of everything logged so far, for `task_log.json`.
    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
