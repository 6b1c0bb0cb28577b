//! `Task`, the unit of work bound to a named action (spec §3).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Bool,
    String,
    Int,
    Float,
    Json,
}

/// A task flattened into the run's single sequence by the loader. `payload`
/// is the task's raw JSON object, preserved verbatim for the action to
/// decode; the loader only reads `id`/`description`/`action` off it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub action: String,
    /// Stamped by the loader to the owning document's id.
    #[serde(default)]
    pub flow_id: String,
    pub payload: Json,

    #[serde(default = "default_status")]
    pub status: TaskStatus,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub start_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub result_type: Option<ResultType>,
    #[serde(default)]
    pub result: Option<Json>,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_status() -> TaskStatus {
    TaskStatus::NotStarted
}

impl Task {
    /// Case-insensitive action identity, used for registry lookups.
    pub fn action_key(&self) -> String {
        self.action.to_ascii_uppercase()
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn mark_in_progress(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::InProgress;
        self.start_timestamp = Some(now);
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>, success: bool, result_type: Option<ResultType>, result: Option<Json>, error: Option<String>) {
        self.status = TaskStatus::Completed;
        self.success = success;
        self.end_timestamp = Some(now);
        self.duration_seconds = self.start_timestamp.map(|start| (now - start).num_milliseconds() as f64 / 1000.0);
        self.result_type = result_type;
        self.result = result;
        self.error = error;
    }
}
